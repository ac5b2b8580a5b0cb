// Customer setup and authentication

use super::constants::PIN_RANGE;
use super::{CustomerDetails, NfcEvent, NfcInputKind, NfcInputValue, NfcOutput, NfcProcessor};
use crate::error::{NfcError, Result};
use crate::storage::customer::{read_customer, write_customer, CustomerRecord};
use crate::storage::TagAccess;
use rand::Rng;
use tracing::{debug, info};

fn generate_pin() -> String {
    rand::thread_rng().gen_range(PIN_RANGE).to_string()
}

impl NfcProcessor {
    pub(super) async fn setup_customer(&self) -> Result<NfcOutput> {
        let details: CustomerDetails = match self.ask(NfcInputKind::ConfirmCustomerData).await {
            Some(NfcInputValue::CustomerData(details)) => details,
            _ => return Err(NfcError::Cancelled),
        };

        self.detect().await?;
        let keys = self.request_keys().await?;
        self.check_aborted()?;

        let record = CustomerRecord {
            id: self.ids.generate_id(),
            name: details.name,
            national_id: details.national_id,
            phone: details.phone,
            pin: generate_pin(),
        };

        self.channels.emit(NfcEvent::WritingCustomerData);
        let access = TagAccess::new(self.transport.as_ref(), keys);
        write_customer(&access, &record, self.timestamp(), self.config.last_data_sector).await?;
        info!(customer_id = %record.id, "Customer record written");

        // The record is already on the tag; dismissing the PIN prompt does not undo it
        let shown = NfcInputKind::SaveCustomerPin {
            pin: record.pin.clone(),
        };
        if self.ask(shown).await.is_none() {
            debug!(customer_id = %record.id, "PIN prompt dismissed");
        }

        Ok(NfcOutput::CustomerSetup { customer: record })
    }

    pub(super) async fn authenticate_customer(&self) -> Result<NfcOutput> {
        self.detect().await?;
        let keys = self.request_keys().await?;

        self.channels.emit(NfcEvent::ReadingCustomerData);
        let access = TagAccess::new(self.transport.as_ref(), keys);
        let record = read_customer(&access).await?;

        let prompt = NfcInputKind::EnterPin {
            customer_name: record.name.clone(),
        };
        match self.ask(prompt).await {
            Some(NfcInputValue::Pin(pin)) if pin == record.pin => {
                info!(customer_id = %record.id, "Customer authenticated");
                Ok(NfcOutput::CustomerAuth { customer: record })
            }
            Some(NfcInputValue::Pin(_)) => Err(NfcError::PinIncorrect),
            _ => Err(NfcError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_pin_has_four_digits() {
        for _ in 0..100 {
            let pin = generate_pin();
            assert_eq!(pin.len(), 4);
            assert!(pin.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
