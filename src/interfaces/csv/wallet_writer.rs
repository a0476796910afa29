use crate::domain::wallet::UnitWallet;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct WalletRecord<'a> {
    fellowship: u64,
    department: &'a str,
    balance: Decimal,
    status: String,
    account: &'a str,
}

/// Writes final wallet states as `fellowship,department,balance,status,account`.
pub struct WalletWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> WalletWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes every wallet ordered by fellowship then department, then flushes.
    pub fn write_wallets(&mut self, mut wallets: Vec<UnitWallet>) -> Result<()> {
        wallets.sort_by(|a, b| {
            (a.fellowship_id, &a.department).cmp(&(b.fellowship_id, &b.department))
        });
        if wallets.is_empty() {
            self.writer
                .write_record(["fellowship", "department", "balance", "status", "account"])?;
        }
        for wallet in &wallets {
            self.writer.serialize(WalletRecord {
                fellowship: wallet.fellowship_id.0,
                department: wallet.department.as_str(),
                balance: wallet.balance.value().normalize(),
                status: wallet.status.to_string(),
                account: wallet.virtual_account.as_deref().unwrap_or_default(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{FellowshipId, WalletId};
    use crate::domain::money::Amount;
    use crate::domain::wallet::{Department, WalletStatus};
    use rust_decimal_macros::dec;

    #[test]
    fn test_writes_sorted_rows() {
        let mut choir = UnitWallet::new(WalletId(1), FellowshipId(2), Department::new("choir").unwrap());
        choir.credit(Amount::new(dec!(980.00)).unwrap()).unwrap();
        choir.virtual_account = Some("9900112233".to_string());
        let mut media = UnitWallet::new(WalletId(2), FellowshipId(1), Department::new("media").unwrap());
        media.status = WalletStatus::Suspended;

        let mut out = Vec::new();
        WalletWriter::new(&mut out).write_wallets(vec![choir, media]).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "fellowship,department,balance,status,account\n\
             1,MEDIA,0,SUSPENDED,\n\
             2,CHOIR,980,ACTIVE,9900112233\n"
        );
    }

    #[test]
    fn test_empty_still_writes_header() {
        let mut out = Vec::new();
        WalletWriter::new(&mut out).write_wallets(Vec::new()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "fellowship,department,balance,status,account\n"
        );
    }
}
