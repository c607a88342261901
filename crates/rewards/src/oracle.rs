//! Oracle committee participation.

use rewardtree_core::{Address, Uint256};
use rewardtree_state::OracleMember;

use crate::window::IntervalWindow;

/// Seconds each member sat on the committee during the window.
///
/// Members that joined after the window ended are left out.
pub fn oracle_participation(members: &[OracleMember], window: &IntervalWindow) -> Vec<(Address, Uint256)> {
    members
        .iter()
        .filter_map(|m| {
            let seconds = window.seconds_after(m.joined_time);
            (seconds > 0).then(|| (m.address, Uint256::from(seconds)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participation_by_join_time() {
        let window = IntervalWindow::new(1_000, 2_000).unwrap();
        let members = [
            OracleMember {
                address: Address::from_low_u64(1),
                joined_time: 10,
            },
            OracleMember {
                address: Address::from_low_u64(2),
                joined_time: 1_500,
            },
            OracleMember {
                address: Address::from_low_u64(3),
                joined_time: 2_000,
            },
        ];
        let got = oracle_participation(&members, &window);
        assert_eq!(
            got,
            vec![
                (Address::from_low_u64(1), Uint256::from(1_000u64)),
                (Address::from_low_u64(2), Uint256::from(500u64)),
            ]
        );
    }
}
