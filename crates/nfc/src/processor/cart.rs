// Cart read and update

use super::{NfcEvent, NfcOutput, NfcProcessor};
use crate::error::Result;
use crate::storage::cart::{apply_cart_operation, read_cart, write_cart, CartOperation};
use crate::storage::TagAccess;
use tracing::info;

impl NfcProcessor {
    pub(super) async fn read_cart(&self) -> Result<NfcOutput> {
        self.detect().await?;
        let keys = self.request_keys().await?;

        self.channels.emit(NfcEvent::ReadingCart);
        let access = TagAccess::new(self.transport.as_ref(), keys);
        let items = read_cart(&access).await?;
        Ok(NfcOutput::Cart { items })
    }

    pub(super) async fn update_cart(
        &self,
        product_id: u16,
        quantity: u8,
        price: u32,
        operation: CartOperation,
    ) -> Result<NfcOutput> {
        self.detect().await?;
        let keys = self.request_keys().await?;
        self.check_aborted()?;

        self.channels.emit(NfcEvent::ReadingCart);
        let access = TagAccess::new(self.transport.as_ref(), keys);
        let items = read_cart(&access).await?;
        let updated = apply_cart_operation(&items, operation, product_id, quantity, price)?;

        self.channels.emit(NfcEvent::WritingCart);
        let header = write_cart(
            &access,
            &updated,
            self.timestamp(),
            self.config.last_data_sector,
        )
        .await?;
        info!(product_id, ?operation, items = header.item_count, "Cart updated");
        Ok(NfcOutput::Cart { items: updated })
    }
}
