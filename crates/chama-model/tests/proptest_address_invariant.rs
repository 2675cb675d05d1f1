// SPDX-License-Identifier: Apache-2.0

use chama_model::{check_address_invariant, ChamaStatus, EvmAddress};
use proptest::prelude::*;
use proptest::test_runner::Config;

fn any_status() -> impl Strategy<Value = ChamaStatus> {
    proptest::sample::select(ChamaStatus::ALL.to_vec())
}

proptest! {
    #![proptest_config(Config::with_cases(128))]
    #[test]
    fn address_present_iff_on_chain_status(
        status in any_status(),
        hex in "[0-9a-f]{40}",
        with_address in any::<bool>(),
    ) {
        let address = EvmAddress::new(format!("0x{hex}")).expect("address");
        let candidate = with_address.then_some(&address);
        let ok = check_address_invariant(status, candidate).is_ok();
        prop_assert_eq!(ok, status.is_on_chain() == with_address);
    }

    #[test]
    fn transitions_never_leave_terminal_states(next in any_status()) {
        prop_assert!(!ChamaStatus::Completed.can_transition_to(next));
        prop_assert!(!ChamaStatus::Cancelled.can_transition_to(next));
    }
}
