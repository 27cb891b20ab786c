use crate::types::Keyblock;

/// Required leading zero hex digits for `issuer`'s block `number` (spec
/// §4.4 step 3). A pure function of the chain snapshot so both the
/// validator and the generation side compute the exact same difficulty.
///
/// `last_block_of_issuer` is `(number, hash)` of the issuer's most recent
/// prior block, if any. With no prior block the issuer carries no penalty
/// and no cooldown period has elapsed to wait out, so `powZeroMin` applies
/// directly.
pub fn expected_zeros(
    pow_zero_min: u32,
    pow_period: i64,
    pow_period_c: bool,
    current_members_count: usize,
    number: u64,
    last_block_of_issuer: Option<(u64, &str)>,
) -> u32 {
    let Some((last_number, last_hash)) = last_block_of_issuer else {
        return pow_zero_min;
    };

    let last_zeros = Keyblock::leading_zero_hex_digits(last_hash) as i64;
    let last_issuer_penalty = last_zeros - pow_zero_min as i64 + 1;

    let period = if pow_period_c {
        pow_period
    } else {
        (pow_period * current_members_count as i64) / 100
    }
    .max(1);
    let periods_waited = (number - last_number) as i64 / period;

    let z = pow_zero_min as i64 + last_issuer_penalty - periods_waited;
    z.max(pow_zero_min as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_prior_block_is_just_the_floor() {
        assert_eq!(expected_zeros(1, 3600, true, 10, 5, None), 1);
    }

    #[test]
    fn recent_high_difficulty_block_penalizes_the_next_one() {
        // last block had 3 leading zeros, floor is 1 -> penalty = 3 - 1 + 1 = 3.
        let got = expected_zeros(1, 10, true, 10, 6, Some((5, "000abc")));
        assert_eq!(got, 4);
    }

    #[test]
    fn waiting_enough_periods_erases_the_penalty() {
        // penalty = 3, one period (P=10) has elapsed by block 16 -> 4 - 1 = 3.
        let got = expected_zeros(1, 10, true, 10, 16, Some((5, "000abc")));
        assert_eq!(got, 3);
        // ten periods elapsed -> floors back to powZeroMin.
        let got_floor = expected_zeros(1, 10, true, 10, 100, Some((5, "000abc")));
        assert_eq!(got_floor, 1);
    }

    #[test]
    fn percent_mode_scales_period_by_members_count() {
        // P = floor(10 * 50 / 100) = 5, one period elapsed after 5 blocks.
        // last block had 2 leading zeros -> penalty = 2 - 1 + 1 = 2, so
        // Z = 1 + 2 - 1 = 2.
        let got = expected_zeros(1, 10, false, 50, 10, Some((5, "00ab")));
        assert_eq!(got, 2);
    }
}
