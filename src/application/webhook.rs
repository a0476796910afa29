use super::commission::CommissionCalculator;
use super::wallets::{audit_deposit, normalize_reference};
use crate::domain::donation::PaymentMethod;
use crate::domain::ids::{TransactionId, UserId, WalletId};
use crate::domain::member::{PayerMatch, match_payer};
use crate::domain::money::Amount;
use crate::domain::ports::{
    DepositEntry, DepositOutcome, DepositReceipt, DonationDraft, LedgerStoreRef,
    MemberDirectoryRef,
};
use crate::error::{Result, WalletError};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Inbound payment notification, using the provider's field names.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaymentNotification {
    pub account_number: String,
    pub amount: Decimal,
    pub reference: String,
    pub payer_name: String,
    #[serde(default)]
    pub payer_phone: Option<String>,
}

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookAck {
    pub accepted: bool,
    /// The reference was already recorded; this is the original result.
    pub duplicate: bool,
    pub transaction_id: TransactionId,
    pub wallet_id: WalletId,
    pub net_amount: Decimal,
    pub member_id: Option<UserId>,
}

/// HMAC-SHA256 over the raw body, hex-encoded in the signature header.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<Vec<u8>>,
}

impl SignatureVerifier {
    /// A verifier without a secret rejects every delivery.
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()).map(|s| s.as_bytes().to_vec()),
        }
    }

    pub fn verify(&self, body: &[u8], signature: &str) -> Result<()> {
        let secret = self.secret.as_deref().ok_or_else(|| {
            WalletError::UpstreamAuthenticationError("no webhook secret configured".to_string())
        })?;
        let expected = hex::decode(signature.trim()).map_err(|_| {
            WalletError::UpstreamAuthenticationError("signature is not valid hex".to_string())
        })?;
        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| WalletError::UpstreamAuthenticationError(e.to_string()))?;
        mac.update(body);
        mac.verify_slice(&expected).map_err(|_| {
            WalletError::UpstreamAuthenticationError("signature mismatch".to_string())
        })
    }

    /// Hex signature for `body`, as the provider would send it.
    pub fn sign(&self, body: &[u8]) -> Result<String> {
        let secret = self.secret.as_deref().ok_or_else(|| {
            WalletError::UpstreamAuthenticationError("no webhook secret configured".to_string())
        })?;
        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| WalletError::UpstreamAuthenticationError(e.to_string()))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Turns verified payment notifications into wallet credits.
///
/// Redeliveries of the same reference return the first result and write nothing.
pub struct WebhookIngestor {
    store: LedgerStoreRef,
    directory: MemberDirectoryRef,
    calculator: CommissionCalculator,
    verifier: SignatureVerifier,
}

impl WebhookIngestor {
    pub fn new(
        store: LedgerStoreRef,
        directory: MemberDirectoryRef,
        calculator: CommissionCalculator,
        verifier: SignatureVerifier,
    ) -> Self {
        Self {
            store,
            directory,
            calculator,
            verifier,
        }
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    /// Verifies and ingests a raw delivery. Nothing is parsed before the signature checks out.
    pub async fn ingest(&self, body: &[u8], signature: &str) -> Result<WebhookAck> {
        if let Err(e) = self.verifier.verify(body, signature) {
            warn!(error = %e, "Rejected payment webhook");
            return Err(e);
        }
        let notification: PaymentNotification = serde_json::from_slice(body)
            .map_err(|e| WalletError::ValidationError(format!("Malformed notification: {e}")))?;
        self.ingest_notification(notification).await
    }

    /// Credits an already-authenticated notification.
    pub async fn ingest_notification(&self, notification: PaymentNotification) -> Result<WebhookAck> {
        let reference = normalize_reference(Some(&notification.reference))?.ok_or_else(|| {
            WalletError::ValidationError("Notification has no payment reference".to_string())
        })?;
        let gross = Amount::new(notification.amount)?;

        if let Some(previous) = self.store.find_deposit_by_reference(&reference).await? {
            debug!(
                transaction_id = %previous.transaction.id,
                "Payment webhook redelivered; returning original result"
            );
            return Ok(ack(&previous, true));
        }

        let wallet = self
            .store
            .find_wallet_by_account(notification.account_number.trim())
            .await?
            .ok_or_else(|| {
                WalletError::NotFound(format!(
                    "No wallet linked to account {}",
                    notification.account_number
                ))
            })?;

        let members = self.directory.members_of(wallet.fellowship_id).await?;
        let payer = match_payer(
            &members,
            &notification.payer_name,
            notification.payer_phone.as_deref(),
        );
        if let PayerMatch::Ambiguous(candidates) = &payer {
            warn!(
                reference = %reference,
                candidates = ?candidates,
                "Payer matches several members; donation left unattributed"
            );
        }

        let split = self.calculator.split(gross, PaymentMethod::VpayTransfer);
        let payer_name = notification.payer_name.trim();
        let entry = DepositEntry {
            wallet_id: wallet.id,
            amount: Amount::new(split.net)?,
            description: format!("VPay transfer from {payer_name}"),
            reference: Some(reference),
            initiated_by: None,
            donation: Some(DonationDraft {
                member_id: payer.member_id(),
                payment_method: PaymentMethod::VpayTransfer,
                note: Some(format!("Payment from {payer_name}")),
            }),
            commission: Some(split),
            expense: None,
        };

        match self.store.apply_deposit(entry).await? {
            DepositOutcome::Applied(receipt) => {
                audit_deposit(&receipt, None, "Credited wallet from payment webhook");
                Ok(ack(&receipt, false))
            }
            DepositOutcome::Duplicate(receipt) => {
                debug!(
                    transaction_id = %receipt.transaction.id,
                    "Payment webhook redelivered; returning original result"
                );
                Ok(ack(&receipt, true))
            }
        }
    }
}

fn ack(receipt: &DepositReceipt, duplicate: bool) -> WebhookAck {
    WebhookAck {
        accepted: true,
        duplicate,
        transaction_id: receipt.transaction.id,
        wallet_id: receipt.wallet.id,
        net_amount: receipt.transaction.amount.value(),
        member_id: receipt.donation.as_ref().and_then(|d| d.member_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::FellowshipId;
    use crate::domain::member::Member;
    use crate::domain::ports::LedgerStore;
    use crate::domain::wallet::Department;
    use crate::infrastructure::in_memory::{InMemoryLedgerStore, InMemoryMemberDirectory};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    const SECRET: &str = "whsec_test";

    async fn ingestor() -> (WebhookIngestor, Arc<InMemoryLedgerStore>, WalletId) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let (wallet, _) = store
            .get_or_create_wallet(FellowshipId(1), &Department::new("CHOIR").unwrap())
            .await
            .unwrap();
        store.link_virtual_account(wallet.id, "9900112233").await.unwrap();

        let directory = Arc::new(InMemoryMemberDirectory::new());
        directory
            .add(Member {
                id: UserId(7),
                fellowship_id: FellowshipId(1),
                name: "Ada Obi".to_string(),
                email: None,
                phone: Some("08031234567".to_string()),
            })
            .await;

        let ingestor = WebhookIngestor::new(
            store.clone(),
            directory,
            CommissionCalculator::default(),
            SignatureVerifier::new(Some(SECRET)),
        );
        (ingestor, store, wallet.id)
    }

    fn body(reference: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "account_number": "9900112233",
            "amount": "1000",
            "reference": reference,
            "payer_name": "Ada Obi",
            "payer_phone": "+234 803 123 4567"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_credits_net_and_ignores_redelivery() {
        let (ingestor, store, wallet_id) = ingestor().await;
        let payload = body("VP-1");
        let signature = ingestor.verifier().sign(&payload).unwrap();

        let first = ingestor.ingest(&payload, &signature).await.unwrap();
        assert!(first.accepted);
        assert!(!first.duplicate);
        assert_eq!(first.net_amount, dec!(980));
        assert_eq!(first.member_id, Some(UserId(7)));

        let second = ingestor.ingest(&payload, &signature).await.unwrap();
        assert!(second.duplicate);
        assert_eq!(second.transaction_id, first.transaction_id);
        assert_eq!(second.net_amount, dec!(980));

        let wallet = store.get_wallet(wallet_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance.value(), dec!(980));
        let commissions = store.commissions(&Default::default()).await.unwrap();
        assert_eq!(commissions.len(), 1);
        assert_eq!(commissions[0].platform_cut, dec!(5.00));
        assert_eq!(commissions[0].processor_fee, dec!(15.00));
    }

    #[tokio::test]
    async fn test_bad_or_missing_signature_is_rejected() {
        let (ingestor, store, wallet_id) = ingestor().await;
        let payload = body("VP-2");

        for signature in ["", "zz", "00ff"] {
            assert!(matches!(
                ingestor.ingest(&payload, signature).await,
                Err(WalletError::UpstreamAuthenticationError(_))
            ));
        }
        let unsigned = SignatureVerifier::new(None);
        assert!(matches!(
            unsigned.verify(&payload, "00"),
            Err(WalletError::UpstreamAuthenticationError(_))
        ));
        let wallet = store.get_wallet(wallet_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance.value(), dec!(0));
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let (ingestor, _, _) = ingestor().await;
        let result = ingestor
            .ingest_notification(PaymentNotification {
                account_number: "0000000000".to_string(),
                amount: dec!(50),
                reference: "VP-3".to_string(),
                payer_name: "Stranger".to_string(),
                payer_phone: None,
            })
            .await;
        assert!(matches!(result, Err(WalletError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unmatched_payer_still_credits() {
        let (ingestor, _, _) = ingestor().await;
        let ack = ingestor
            .ingest_notification(PaymentNotification {
                account_number: "9900112233".to_string(),
                amount: dec!(100),
                reference: "VP-4".to_string(),
                payer_name: "Somebody Else".to_string(),
                payer_phone: None,
            })
            .await
            .unwrap();
        assert_eq!(ack.member_id, None);
        assert_eq!(ack.net_amount, dec!(98.00));
    }

    #[tokio::test]
    async fn test_redelivery_after_relinking_returns_first_result() {
        let (ingestor, store, wallet_id) = ingestor().await;
        let payload = body("VP-5");
        let signature = ingestor.verifier().sign(&payload).unwrap();
        let first = ingestor.ingest(&payload, &signature).await.unwrap();

        store.link_virtual_account(wallet_id, "5500667788").await.unwrap();

        let replay = ingestor.ingest(&payload, &signature).await.unwrap();
        assert!(replay.duplicate);
        assert_eq!(replay.transaction_id, first.transaction_id);
        assert_eq!(replay.wallet_id, wallet_id);
        assert_eq!(replay.net_amount, dec!(980));
        assert_eq!(replay.member_id, Some(UserId(7)));

        let wallet = store.get_wallet(wallet_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance.value(), dec!(980));
    }

    #[tokio::test]
    async fn test_small_transfer_still_records_commission() {
        let (ingestor, store, wallet_id) = ingestor().await;
        let ack = ingestor
            .ingest_notification(PaymentNotification {
                account_number: "9900112233".to_string(),
                amount: dec!(0.20),
                reference: "VP-6".to_string(),
                payer_name: "Ada Obi".to_string(),
                payer_phone: None,
            })
            .await
            .unwrap();
        assert_eq!(ack.net_amount, dec!(0.20));

        let commissions = store.commissions(&Default::default()).await.unwrap();
        assert_eq!(commissions.len(), 1);
        assert_eq!(commissions[0].transaction_id, ack.transaction_id);
        assert_eq!(commissions[0].gross_amount, dec!(0.20));
        assert!(commissions[0].processor_fee.is_zero());
        assert!(commissions[0].platform_cut.is_zero());
        assert_eq!(commissions[0].net_amount, dec!(0.20));

        let wallet = store.get_wallet(wallet_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance.value(), dec!(0.20));
    }
}
