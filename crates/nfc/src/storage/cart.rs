// Cart storage
//
// Header in the first data block after the customer record, items packed in
// the blocks after it.

use super::customer::{data_end, read_customer_header};
use super::TagAccess;
use crate::codec::records::CART_ITEM_SIZE;
use crate::codec::{BlockCursor, CartHeader, CartItem};
use crate::error::{NfcError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartOperation {
    /// Merge into the existing line for the product; its price stays
    Add,
    /// Take `quantity` units off, newest lines first (0 removes the product)
    Remove,
    Clear,
}

pub fn apply_cart_operation(
    items: &[CartItem],
    operation: CartOperation,
    product_id: u16,
    quantity: u8,
    price: u32,
) -> Result<Vec<CartItem>> {
    let mut items = items.to_vec();
    match operation {
        CartOperation::Add => {
            if let Some(line) = items.iter_mut().find(|i| i.product_id == product_id) {
                line.count = line
                    .count
                    .checked_add(quantity)
                    .ok_or(NfcError::QuantityOverflow(product_id))?;
            } else {
                if items.len() >= usize::from(u8::MAX) {
                    return Err(NfcError::CartWrite("cart holds 255 lines".to_string()));
                }
                items.push(CartItem::new(product_id, quantity, price));
            }
        }
        CartOperation::Remove => {
            if !items.iter().any(|i| i.product_id == product_id) {
                return Err(NfcError::CartWrite(format!(
                    "product {} is not in the cart",
                    product_id
                )));
            }
            if quantity == 0 {
                items.retain(|i| i.product_id != product_id);
            } else {
                let mut remaining = quantity;
                for line in items.iter_mut().rev() {
                    if remaining == 0 {
                        break;
                    }
                    if line.product_id == product_id {
                        let taken = remaining.min(line.count);
                        line.count -= taken;
                        remaining -= taken;
                    }
                }
                items.retain(|i| i.count > 0);
            }
        }
        CartOperation::Clear => items.clear(),
    }
    Ok(items)
}

pub async fn read_cart_header(access: &TagAccess<'_>) -> Result<Option<CartHeader>> {
    let customer = read_customer_header(access).await?;
    let block = access.read(data_end(customer.as_ref())).await?;
    Ok(CartHeader::decode(&block))
}

/// Items on the tag; empty when no cart was ever written
pub async fn read_cart(access: &TagAccess<'_>) -> Result<Vec<CartItem>> {
    read_items(access).await.map_err(|e| match e {
        NfcError::CartRead(_) => e,
        other => NfcError::CartRead(other.to_string()),
    })
}

async fn read_items(access: &TagAccess<'_>) -> Result<Vec<CartItem>> {
    let Some(header) = read_cart_header(access).await? else {
        return Ok(Vec::new());
    };

    let start = BlockCursor::new(header.start_sector, header.start_block);
    let bytes = access.read_span(start, usize::from(header.total_bytes)).await?;
    let items: Vec<CartItem> = bytes
        .chunks_exact(CART_ITEM_SIZE)
        .filter_map(CartItem::decode)
        .collect();

    if items.len() != usize::from(header.item_count) {
        return Err(NfcError::CartRead(format!(
            "header lists {} items, found {}",
            header.item_count,
            items.len()
        )));
    }
    Ok(items)
}

/// Replace the cart. `InsufficientSpace` passes through unchanged, other
/// failures become `CartWrite`.
pub async fn write_cart(
    access: &TagAccess<'_>,
    items: &[CartItem],
    timestamp: u64,
    last_sector: u8,
) -> Result<CartHeader> {
    write_items(access, items, timestamp, last_sector)
        .await
        .map_err(|e| match e {
            NfcError::InsufficientSpace { .. } | NfcError::CartWrite(_) => e,
            other => NfcError::CartWrite(other.to_string()),
        })
}

async fn write_items(
    access: &TagAccess<'_>,
    items: &[CartItem],
    timestamp: u64,
    last_sector: u8,
) -> Result<CartHeader> {
    let item_count = u8::try_from(items.len())
        .map_err(|_| NfcError::CartWrite(format!("{} lines exceed 255", items.len())))?;
    let bytes: Vec<u8> = items.iter().flat_map(|i| i.encode()).collect();
    let total_bytes = u16::try_from(bytes.len())
        .map_err(|_| NfcError::CartWrite(format!("cart too large: {} bytes", bytes.len())))?;

    let customer = read_customer_header(access).await?;
    let header_at = data_end(customer.as_ref());
    if header_at.sector > last_sector {
        return Err(NfcError::InsufficientSpace {
            needed: 1,
            available: 0,
        });
    }
    let start = header_at.next();
    let end = access
        .write_span(start, &bytes, last_sector)
        .await?
        .unwrap_or(start);

    let header = CartHeader {
        start_sector: start.sector,
        start_block: start.block,
        end_sector: end.sector,
        end_block: end.block,
        item_count,
        total_bytes,
        timestamp,
    };
    access.write(header_at, header.encode()).await?;
    debug!(item_count, total_bytes, "Cart written");
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{SectorKey, SectorKeys};
    use crate::storage::customer::{write_customer, CustomerRecord};
    use crate::transport::SimulatedTag;

    fn keys() -> SectorKeys {
        SectorKeys::both(SectorKey::DEFAULT, SectorKey::DEFAULT)
    }

    #[test]
    fn test_add_merges_and_locks_price() {
        let items = vec![CartItem::new(7, 2, 500)];
        let items = apply_cart_operation(&items, CartOperation::Add, 7, 3, 999).unwrap();
        assert_eq!(items, vec![CartItem::new(7, 5, 500)]);

        let items = apply_cart_operation(&items, CartOperation::Add, 8, 1, 250).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], CartItem::new(8, 1, 250));
    }

    #[test]
    fn test_add_overflow() {
        let items = vec![CartItem::new(7, 250, 500)];
        assert_eq!(
            apply_cart_operation(&items, CartOperation::Add, 7, 6, 500),
            Err(NfcError::QuantityOverflow(7))
        );
        assert_eq!(
            apply_cart_operation(&items, CartOperation::Add, 7, 5, 500).unwrap()[0].count,
            255
        );
    }

    #[test]
    fn test_remove_newest_lines_first() {
        let items = vec![
            CartItem::new(1, 2, 100),
            CartItem::new(2, 1, 300),
            CartItem::new(1, 3, 120),
        ];

        let items = apply_cart_operation(&items, CartOperation::Remove, 1, 4, 0).unwrap();
        assert_eq!(items, vec![CartItem::new(1, 1, 100), CartItem::new(2, 1, 300)]);

        let items = apply_cart_operation(&items, CartOperation::Remove, 1, 0, 0).unwrap();
        assert_eq!(items, vec![CartItem::new(2, 1, 300)]);

        assert!(matches!(
            apply_cart_operation(&items, CartOperation::Remove, 9, 1, 0),
            Err(NfcError::CartWrite(_))
        ));
    }

    #[test]
    fn test_clear() {
        let items = vec![CartItem::new(1, 2, 100)];
        assert!(apply_cart_operation(&items, CartOperation::Clear, 0, 0, 0)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_empty_tag_reads_empty_cart() {
        let tag = SimulatedTag::classic_1k([1, 2, 3, 4]);
        let access = TagAccess::new(&tag, keys());
        assert_eq!(read_cart(&access).await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_cart_follows_customer_record() {
        let tag = SimulatedTag::classic_1k([1, 2, 3, 4]);
        let access = TagAccess::new(&tag, keys());
        let record = CustomerRecord {
            id: "c".to_string(),
            name: "Ana".to_string(),
            national_id: "1".to_string(),
            phone: "2".to_string(),
            pin: "1234".to_string(),
        };
        let customer = write_customer(&access, &record, 0, 15).await.unwrap();

        let items = vec![
            CartItem::new(1, 2, 100),
            CartItem::new(2, 1, 300),
            CartItem::new(3, 9, 50),
        ];
        let header = write_cart(&access, &items, 5, 15).await.unwrap();

        let header_at = data_end(Some(&customer));
        let raw = tag.raw_block(header_at.sector, header_at.block).unwrap();
        assert_eq!(CartHeader::decode(&raw), Some(header));
        assert_eq!(
            BlockCursor::new(header.start_sector, header.start_block),
            header_at.next()
        );
        assert_eq!(header.item_count, 3);
        assert_eq!(header.total_bytes, 21);

        assert_eq!(read_cart(&access).await.unwrap(), items);
        assert_eq!(
            crate::storage::customer::read_customer(&access).await.unwrap(),
            record
        );
    }

    #[tokio::test]
    async fn test_empty_cart_roundtrip() {
        let tag = SimulatedTag::classic_1k([1, 2, 3, 4]);
        let access = TagAccess::new(&tag, keys());

        write_cart(&access, &[CartItem::new(1, 1, 1)], 0, 15).await.unwrap();
        let header = write_cart(&access, &[], 0, 15).await.unwrap();

        assert_eq!(header.item_count, 0);
        assert_eq!(read_cart(&access).await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_cart_without_space() {
        let tag = SimulatedTag::classic_1k([1, 2, 3, 4]);
        let access = TagAccess::new(&tag, keys());
        // header at (1,0), items from (1,1): 2 blocks = 32 bytes = 4 items
        let items: Vec<CartItem> = (0..5).map(|i| CartItem::new(i, 1, 1)).collect();

        assert!(write_cart(&access, &items[..4], 0, 1).await.is_ok());
        assert!(matches!(
            write_cart(&access, &items, 0, 1).await,
            Err(NfcError::InsufficientSpace { needed: 3, available: 2 })
        ));
    }

    #[tokio::test]
    async fn test_write_failure_maps_to_cart_error() {
        let tag = SimulatedTag::classic_1k([1, 2, 3, 4]);
        let access = TagAccess::new(&tag, keys());
        tag.set_fail_writes(true);

        assert!(matches!(
            write_cart(&access, &[CartItem::new(1, 1, 1)], 0, 15).await,
            Err(NfcError::CartWrite(_))
        ));
    }
}
