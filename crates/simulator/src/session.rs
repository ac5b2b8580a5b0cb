// Scripted point-of-sale session

use ticpass_nfc::brute_force::BruteForceMode;
use ticpass_nfc::storage::balance::BalanceOperation;
use ticpass_nfc::storage::cart::CartOperation;
use ticpass_nfc::{NfcOperation, NfcQueueItem};

/// Format runs ahead of everything else
const FORMAT_PRIORITY: i32 = 10;

/// Starting credit loaded onto the demo card (cents)
pub const DEMO_TOP_UP: u64 = 50_00;

/// A new card is formatted, registered, topped up and used to buy two items.
/// Equal priorities keep their enqueue order.
pub fn scripted_session() -> Vec<NfcQueueItem> {
    vec![
        NfcQueueItem::new(NfcOperation::TagFormat {
            brute_force: BruteForceMode::MostLikely,
        })
        .with_priority(FORMAT_PRIORITY),
        NfcQueueItem::new(NfcOperation::CustomerSetup),
        NfcQueueItem::new(NfcOperation::BalanceUpdate {
            amount: DEMO_TOP_UP,
            op: BalanceOperation::Set,
        }),
        NfcQueueItem::new(NfcOperation::CustomerAuth),
        NfcQueueItem::new(NfcOperation::CartUpdate {
            product_id: 101,
            quantity: 2,
            price: 3_50,
            op: CartOperation::Add,
        }),
        NfcQueueItem::new(NfcOperation::CartUpdate {
            product_id: 205,
            quantity: 1,
            price: 12_00,
            op: CartOperation::Add,
        }),
        NfcQueueItem::new(NfcOperation::CartRead),
        NfcQueueItem::new(NfcOperation::BalanceRead),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_formats_first() {
        let session = scripted_session();
        assert!(matches!(
            session[0].operation,
            NfcOperation::TagFormat { .. }
        ));
        assert!(session[1..]
            .iter()
            .all(|item| item.priority < session[0].priority));
    }

    #[test]
    fn test_session_items_have_unique_ids() {
        let session = scripted_session();
        let mut ids: Vec<_> = session.iter().map(|item| item.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), session.len());
    }
}
