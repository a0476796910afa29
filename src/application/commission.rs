use crate::domain::donation::{CommissionBreakdown, PaymentMethod};
use crate::domain::money::{Amount, round_minor};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Fee rates applied to externally routed payments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionRates {
    /// Payment processor's cut (1.5%).
    pub processor_rate: Decimal,
    /// Platform's cut (0.5%).
    pub platform_rate: Decimal,
}

impl Default for CommissionRates {
    fn default() -> Self {
        Self {
            processor_rate: dec!(0.015),
            platform_rate: dec!(0.005),
        }
    }
}

/// Splits gross payments into processor fee, platform cut and net credit.
///
/// Each fee is rounded half-up to the minor unit once; the net is whatever
/// remains, so the three parts always sum back to the gross exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CommissionCalculator {
    rates: CommissionRates,
}

impl CommissionCalculator {
    pub fn new(rates: CommissionRates) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> CommissionRates {
        self.rates
    }

    pub fn split(&self, gross: Amount, method: PaymentMethod) -> CommissionBreakdown {
        let gross = gross.value();
        if !method.is_externally_routed() {
            return CommissionBreakdown {
                gross,
                processor_fee: Decimal::ZERO,
                platform_cut: Decimal::ZERO,
                net: gross,
                platform_rate: Decimal::ZERO,
            };
        }

        let processor_fee = round_minor(gross * self.rates.processor_rate);
        let platform_cut = round_minor(gross * self.rates.platform_rate);
        CommissionBreakdown {
            gross,
            processor_fee,
            platform_cut,
            net: gross - processor_fee - platform_cut,
            platform_rate: self.rates.platform_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(gross: Decimal) -> CommissionBreakdown {
        CommissionCalculator::default().split(Amount::new(gross).unwrap(), PaymentMethod::VpayTransfer)
    }

    #[test]
    fn test_externally_routed_split() {
        let cases = [
            (dec!(100), dec!(1.50), dec!(0.50), dec!(98.00)),
            (dec!(999), dec!(14.99), dec!(5.00), dec!(979.01)),
            (dec!(10000.33), dec!(150.00), dec!(50.00), dec!(9800.33)),
            (dec!(1), dec!(0.02), dec!(0.01), dec!(0.97)),
            (dec!(1000), dec!(15), dec!(5), dec!(980)),
        ];
        for (gross, fee, cut, net) in cases {
            let result = split(gross);
            assert_eq!(result.processor_fee, fee, "fee for {gross}");
            assert_eq!(result.platform_cut, cut, "cut for {gross}");
            assert_eq!(result.net, net, "net for {gross}");
            assert_eq!(
                result.processor_fee + result.platform_cut + result.net,
                gross
            );
        }
    }

    #[test]
    fn test_other_methods_carry_no_fees() {
        let calc = CommissionCalculator::default();
        for method in [PaymentMethod::Cash, PaymentMethod::BankTransfer, PaymentMethod::Pos] {
            let result = calc.split(Amount::new(dec!(250.75)).unwrap(), method);
            assert_eq!(result.net, dec!(250.75));
            assert!(result.processor_fee.is_zero() && result.platform_cut.is_zero());
        }
    }

    #[test]
    fn test_custom_rates() {
        let calc = CommissionCalculator::new(CommissionRates {
            processor_rate: dec!(0.01),
            platform_rate: dec!(0),
        });
        let result = calc.split(Amount::new(dec!(200)).unwrap(), PaymentMethod::VpayTransfer);
        assert_eq!(result.processor_fee, dec!(2.00));
        assert_eq!(result.platform_cut, dec!(0));
        assert_eq!(result.net, dec!(198.00));
    }
}
