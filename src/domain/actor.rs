use super::ids::{FellowshipId, UserId};
use super::wallet::Department;
use crate::error::WalletError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Organizational role carried by an authenticated identity.
///
/// Office roles (`SecretaryGeneral` .. `FinancialSecretary`) are the ones approval
/// chains are built from.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Executive,
    SecretaryGeneral,
    #[serde(alias = "PRESIDENCY")]
    President,
    VicePresident,
    FinancialSecretary,
    Worker,
    Member,
}

impl Role {
    /// Roles that lead a unit or hold an office.
    pub fn is_executive(&self) -> bool {
        match self {
            Self::SuperAdmin
            | Self::Executive
            | Self::SecretaryGeneral
            | Self::President
            | Self::VicePresident
            | Self::FinancialSecretary => true,
            Self::Worker | Self::Member => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Executive => "EXECUTIVE",
            Self::SecretaryGeneral => "SECRETARY_GENERAL",
            Self::President => "PRESIDENT",
            Self::VicePresident => "VICE_PRESIDENT",
            Self::FinancialSecretary => "FINANCIAL_SECRETARY",
            Self::Worker => "WORKER",
            Self::Member => "MEMBER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace(['-', ' '], "_").as_str() {
            "SUPER_ADMIN" => Ok(Self::SuperAdmin),
            "EXECUTIVE" => Ok(Self::Executive),
            "SECRETARY_GENERAL" => Ok(Self::SecretaryGeneral),
            "PRESIDENT" | "PRESIDENCY" => Ok(Self::President),
            "VICE_PRESIDENT" => Ok(Self::VicePresident),
            "FINANCIAL_SECRETARY" => Ok(Self::FinancialSecretary),
            "WORKER" => Ok(Self::Worker),
            "MEMBER" => Ok(Self::Member),
            other => Err(WalletError::ValidationError(format!("Unknown role '{other}'"))),
        }
    }
}

/// Authenticated identity supplied by the surrounding system.
///
/// The ledger trusts who the actor is, but re-checks what the actor may do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
    pub department: Option<Department>,
    pub fellowship_id: FellowshipId,
}

impl Actor {
    pub fn new(
        id: UserId,
        role: Role,
        department: Option<Department>,
        fellowship_id: FellowshipId,
    ) -> Self {
        Self {
            id,
            role,
            department,
            fellowship_id,
        }
    }

    pub fn ensure_fellowship(&self, fellowship_id: FellowshipId) -> Result<(), WalletError> {
        if self.fellowship_id != fellowship_id {
            return Err(WalletError::Unauthorized(format!(
                "Actor {} does not belong to fellowship {}",
                self.id, fellowship_id
            )));
        }
        Ok(())
    }

    pub fn ensure_executive(&self) -> Result<(), WalletError> {
        if !self.role.is_executive() {
            return Err(WalletError::Unauthorized(format!(
                "Role {} cannot manage unit wallets",
                self.role
            )));
        }
        Ok(())
    }

    pub fn ensure_super_admin(&self) -> Result<(), WalletError> {
        if self.role != Role::SuperAdmin {
            return Err(WalletError::Unauthorized(format!(
                "Role {} is not a super admin",
                self.role
            )));
        }
        Ok(())
    }

    /// Only the head of a unit may move that unit's money.
    pub fn ensure_heads(&self, department: &Department) -> Result<(), WalletError> {
        self.ensure_executive()?;
        if self.department.as_ref() != Some(department) {
            return Err(WalletError::Unauthorized(format!(
                "Only the {department} unit head may request its withdrawals"
            )));
        }
        Ok(())
    }

    /// Finance oversight: the FINANCE department, the Financial Secretary, or a super admin.
    pub fn ensure_finance_oversight(&self) -> Result<(), WalletError> {
        let finance = self
            .department
            .as_ref()
            .is_some_and(|d| d.as_str() == "FINANCE");
        if finance || matches!(self.role, Role::FinancialSecretary | Role::SuperAdmin) {
            Ok(())
        } else {
            Err(WalletError::Unauthorized(
                "Access restricted to the Financial Secretary".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role, department: Option<&str>) -> Actor {
        Actor::new(
            UserId(1),
            role,
            department.map(|d| Department::new(d).unwrap()),
            FellowshipId(1),
        )
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("secretary-general".parse::<Role>().unwrap(), Role::SecretaryGeneral);
        assert_eq!("PRESIDENCY".parse::<Role>().unwrap(), Role::President);
        assert!(matches!(
            "bishop".parse::<Role>(),
            Err(WalletError::ValidationError(_))
        ));
    }

    #[test]
    fn test_unit_head_check() {
        let music = Department::new("MUSIC").unwrap();
        assert!(actor(Role::Executive, Some("music")).ensure_heads(&music).is_ok());
        assert!(matches!(
            actor(Role::Executive, Some("MEDIA")).ensure_heads(&music),
            Err(WalletError::Unauthorized(_))
        ));
        assert!(matches!(
            actor(Role::Worker, Some("MUSIC")).ensure_heads(&music),
            Err(WalletError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_finance_oversight() {
        assert!(actor(Role::Executive, Some("FINANCE")).ensure_finance_oversight().is_ok());
        assert!(actor(Role::FinancialSecretary, None).ensure_finance_oversight().is_ok());
        assert!(actor(Role::Executive, Some("MUSIC")).ensure_finance_oversight().is_err());
    }
}
