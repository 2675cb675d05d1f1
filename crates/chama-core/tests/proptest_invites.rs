// SPDX-License-Identifier: Apache-2.0

use chama_core::{redeem_in_place, InviteCode, InviteError};
use chama_model::{ChamaId, EvmAddress, Invite};
use proptest::prelude::*;
use proptest::test_runner::Config;

fn addr(n: u32) -> EvmAddress {
    EvmAddress::new(format!("0x{n:040x}")).expect("address")
}

proptest! {
    #![proptest_config(Config::with_cases(128))]
    #[test]
    fn uses_never_exceed_max(max_uses in 1_u32..8, attempts in 0_u32..20) {
        let mut invite = Invite {
            code: "CHM-000001-ALL-1-000000".to_string(),
            inviter: addr(1),
            chama_id: None,
            created_at: 0,
            expires_at: 1_000,
            max_uses,
            current_uses: 0,
            is_active: true,
        };
        let mut successes = 0_u32;
        for n in 0..attempts {
            match redeem_in_place(&mut invite, &addr(100 + n), 10) {
                Ok(()) => successes += 1,
                Err(err) => prop_assert_eq!(err, InviteError::Exhausted { max_uses }),
            }
            prop_assert!(invite.current_uses <= invite.max_uses);
        }
        prop_assert_eq!(successes, attempts.min(max_uses));
    }

    #[test]
    fn composed_codes_round_trip_through_parse(
        tail in 0_u32..u32::MAX,
        id in "[a-z0-9][a-z0-9_-]{0,20}",
        issued_at in 0_u64..4_000_000_000,
        random in any::<u64>(),
        scoped in any::<bool>(),
    ) {
        let chama = ChamaId::new(id).expect("id");
        let code = InviteCode::compose(&addr(tail), scoped.then_some(&chama), issued_at, random);
        let parsed = InviteCode::parse(&code.to_string()).expect("parse");
        prop_assert_eq!(&parsed, &code);
        prop_assert_eq!(parsed.targets_chama(&chama), scoped);
    }
}
