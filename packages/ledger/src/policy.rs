// ABOUTME: Post-debit ledger policy
// ABOUTME: Decides when a recharge is due and when the account's agents must stop

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyDecision {
    /// The external billing collaborator should charge the account
    pub recharge_due: bool,
    /// No credit remains; running agents must be paused
    pub exhausted: bool,
}

pub fn evaluate(
    auto_recharge_enabled: bool,
    low_balance_threshold_cents: i64,
    new_balance_cents: i64,
) -> PolicyDecision {
    PolicyDecision {
        recharge_due: auto_recharge_enabled && new_balance_cents <= low_balance_threshold_cents,
        exhausted: new_balance_cents <= 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(false, 500, 100, false, false)]
    #[case(true, 500, 100, true, false)]
    #[case(true, 500, 500, true, false)]
    #[case(true, 500, 501, false, false)]
    #[case(true, 500, 0, true, true)]
    #[case(false, 500, 0, false, true)]
    fn test_policy(
        #[case] auto_recharge: bool,
        #[case] threshold: i64,
        #[case] balance: i64,
        #[case] recharge_due: bool,
        #[case] exhausted: bool,
    ) {
        assert_eq!(
            evaluate(auto_recharge, threshold, balance),
            PolicyDecision {
                recharge_due,
                exhausted
            }
        );
    }
}
