use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Tenant identifier. Validated by the surrounding system before it reaches the ledger.
    FellowshipId
);
id_type!(WalletId);
id_type!(TransactionId);
id_type!(ApprovalId);
id_type!(DonationId);
id_type!(CommissionId);
id_type!(ExpenseId);
id_type!(
    /// A fellowship member or user account; actors and donors share this space.
    UserId
);
