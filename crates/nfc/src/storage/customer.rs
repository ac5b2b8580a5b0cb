// Customer record storage
//
// JSON packed from sector 1 block 0; the header in sector 0 block 1 records
// where it ends.

use super::{TagAccess, CUSTOMER_DATA_START, CUSTOMER_HEADER_LOCATION};
use crate::codec::{BlockCursor, CustomerHeader};
use crate::error::{NfcError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: String,
    pub name: String,
    pub national_id: String,
    pub phone: String,
    pub pin: String,
}

pub async fn read_customer_header(access: &TagAccess<'_>) -> Result<Option<CustomerHeader>> {
    let block = access.read(CUSTOMER_HEADER_LOCATION).await?;
    Ok(CustomerHeader::decode(&block))
}

pub async fn read_customer(access: &TagAccess<'_>) -> Result<CustomerRecord> {
    let header = read_customer_header(access)
        .await?
        .ok_or_else(|| NfcError::CustomerData("tag has no customer record".to_string()))?;

    let bytes = access
        .read_span(CUSTOMER_DATA_START, usize::from(header.total_bytes))
        .await?;
    serde_json::from_slice(&bytes).map_err(|e| NfcError::CustomerData(e.to_string()))
}

pub async fn write_customer(
    access: &TagAccess<'_>,
    record: &CustomerRecord,
    timestamp: u64,
    last_sector: u8,
) -> Result<CustomerHeader> {
    let bytes = serde_json::to_vec(record).map_err(|e| NfcError::CustomerData(e.to_string()))?;
    let total_bytes = u16::try_from(bytes.len())
        .map_err(|_| NfcError::CustomerData(format!("record too large: {} bytes", bytes.len())))?;

    let end = access
        .write_span(CUSTOMER_DATA_START, &bytes, last_sector)
        .await?
        .unwrap_or(CUSTOMER_DATA_START);

    let header = CustomerHeader {
        end_sector: end.sector,
        end_block: end.block,
        total_bytes,
        timestamp,
    };
    access.write(CUSTOMER_HEADER_LOCATION, header.encode()).await?;
    debug!(total_bytes, end_sector = end.sector, end_block = end.block, "Customer record written");
    Ok(header)
}

/// First block after the customer data (where the cart header goes)
pub fn data_end(header: Option<&CustomerHeader>) -> BlockCursor {
    match header {
        Some(h) => BlockCursor::new(h.end_sector, h.end_block).next(),
        None => CUSTOMER_DATA_START,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{SectorKey, SectorKeys};
    use crate::transport::SimulatedTag;

    fn keys() -> SectorKeys {
        SectorKeys::both(SectorKey::DEFAULT, SectorKey::DEFAULT)
    }

    fn record() -> CustomerRecord {
        CustomerRecord {
            id: "c-1".to_string(),
            name: "Maria Souza".to_string(),
            national_id: "12345678900".to_string(),
            phone: "+55 11 99999-0000".to_string(),
            pin: "4821".to_string(),
        }
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_string(&record()).unwrap();
        assert!(json.contains("\"nationalId\":\"12345678900\""));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let tag = SimulatedTag::classic_1k([1, 2, 3, 4]);
        let access = TagAccess::new(&tag, keys());

        let header = write_customer(&access, &record(), 77, 15).await.unwrap();
        let len = serde_json::to_vec(&record()).unwrap().len();
        assert_eq!(usize::from(header.total_bytes), len);
        assert_eq!(header.timestamp, 77);

        assert_eq!(read_customer_header(&access).await.unwrap(), Some(header));
        assert_eq!(read_customer(&access).await.unwrap(), record());
    }

    #[tokio::test]
    async fn test_missing_record() {
        let tag = SimulatedTag::classic_1k([1, 2, 3, 4]);
        let access = TagAccess::new(&tag, keys());

        assert!(matches!(
            read_customer(&access).await,
            Err(NfcError::CustomerData(_))
        ));
        assert_eq!(data_end(None), CUSTOMER_DATA_START);
    }

    #[tokio::test]
    async fn test_no_space_for_record() {
        let tag = SimulatedTag::classic_1k([1, 2, 3, 4]);
        let access = TagAccess::new(&tag, keys());

        // Sector 1 only: 48 bytes
        let err = write_customer(&access, &record(), 0, 1).await.unwrap_err();
        assert!(matches!(err, NfcError::InsufficientSpace { available: 3, .. }));
    }

    #[test]
    fn test_data_end_skips_trailer() {
        let header = CustomerHeader {
            end_sector: 2,
            end_block: 2,
            total_bytes: 90,
            timestamp: 0,
        };
        assert_eq!(data_end(Some(&header)), BlockCursor { sector: 3, block: 0 });
    }
}
