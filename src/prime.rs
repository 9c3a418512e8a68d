/*
 * prime.rs
 *
 * Map capacities are prime so the double-hashing stride is coprime with
 * the table size and a probe sequence visits every slot.
 *
 * is_prime: trial division by small primes, then deterministic
 * Miller-Rabin. The witness set below is exact for every u64, so this is
 * a proof, not a guess. Cost is a few dozen multiplications per candidate
 * regardless of size.
 */

/* first primes, used for trial division and as Miller-Rabin witnesses */
const SMALL_PRIMES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

#[inline]
const fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

const fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut acc = 1 % m;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    acc
}

/* one Miller-Rabin round: n - 1 = d * 2^s with d odd */
const fn passes_round(n: u64, witness: u64, d: u64, s: u32) -> bool {
    let mut x = pow_mod(witness, d, n);
    if x == 1 || x == n - 1 {
        return true;
    }
    let mut r = 1;
    while r < s {
        x = mul_mod(x, x, n);
        if x == n - 1 {
            return true;
        }
        r += 1;
    }
    false
}

/// Whether `n` is prime. 0 and 1 are not.
#[must_use]
pub const fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    let mut i = 0;
    while i < SMALL_PRIMES.len() {
        let p = SMALL_PRIMES[i];
        if n == p {
            return true;
        }
        if n % p == 0 {
            return false;
        }
        i += 1;
    }
    /* no factor <= 37, so anything below 41^2 is prime */
    if n < 41 * 41 {
        return true;
    }

    let s = (n - 1).trailing_zeros();
    let d = (n - 1) >> s;
    let mut i = 0;
    while i < SMALL_PRIMES.len() {
        if !passes_round(n, SMALL_PRIMES[i], d, s) {
            return false;
        }
        i += 1;
    }
    true
}

/// Smallest prime `>= n`, or `None` if that would not fit in `usize`.
#[must_use]
pub fn next_prime(n: usize) -> Option<usize> {
    if n <= 2 {
        return Some(2);
    }
    /* even numbers above 2 are never prime */
    let mut candidate = n | 1;
    loop {
        if is_prime(candidate as u64) {
            return Some(candidate);
        }
        candidate = candidate.checked_add(2)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_is_prime(n: u64) -> bool {
        n >= 2 && (2..n).take_while(|d| d * d <= n).all(|d| n % d != 0)
    }

    #[test]
    fn test_small_numbers_match_naive() {
        for n in 0..20_000u64 {
            assert_eq!(is_prime(n), naive_is_prime(n), "disagree on {}", n);
        }
    }

    #[test]
    fn test_zero_and_one_not_prime() {
        assert!(!is_prime(0));
        assert!(!is_prime(1));
    }

    #[test]
    fn test_known_large_values() {
        assert!(is_prime(2_147_483_647)); /* 2^31 - 1 */
        assert!(is_prime(18_446_744_073_709_551_557)); /* largest u64 prime */
        assert!(!is_prime(18_446_744_073_709_551_615)); /* u64::MAX */
        /* strong pseudoprime to bases 2, 3, 5, 7 */
        assert!(!is_prime(3_215_031_751));
        /* Carmichael number */
        assert!(!is_prime(561));
    }

    #[test]
    fn test_next_prime() {
        assert_eq!(next_prime(0), Some(2));
        assert_eq!(next_prime(2), Some(2));
        assert_eq!(next_prime(3), Some(3));
        assert_eq!(next_prime(13), Some(13));
        assert_eq!(next_prime(14), Some(17));
        assert_eq!(next_prime(26), Some(29));
        assert_eq!(next_prime(58), Some(59));
        assert_eq!(next_prime(118), Some(127));
    }

    #[test]
    fn test_next_prime_overflow() {
        assert_eq!(next_prime(usize::MAX), None);
    }

    #[test]
    fn test_map_growth_sequence() {
        /* 13 -> next prime >= 2x, repeatedly */
        let mut cap = 13usize;
        let mut seen = std::vec::Vec::new();
        for _ in 0..6 {
            seen.push(cap);
            cap = next_prime(cap * 2).unwrap();
        }
        assert_eq!(seen, [13, 29, 59, 127, 257, 521]);
    }
}

/* -------------------------------------------------------------------------- */
/*                              kani proofs                                   */
/* -------------------------------------------------------------------------- */

#[cfg(kani)]
mod kani_proofs {
    use super::*;

    /*
     * is_prime agrees with trial division on a bounded domain.
     */
    #[kani::proof]
    #[kani::unwind(40)]
    fn verify_is_prime_small() {
        let n: u64 = kani::any();
        kani::assume(n < 1024);
        let mut composite = false;
        let mut d = 2;
        while d * d <= n {
            if n % d == 0 {
                composite = true;
            }
            d += 1;
        }
        kani::assert(is_prime(n) == (n >= 2 && !composite), "matches trial division");
    }

    /*
     * next_prime never returns something below its argument.
     */
    #[kani::proof]
    #[kani::unwind(40)]
    fn verify_next_prime_not_below() {
        let n: usize = kani::any();
        kani::assume(n < 256);
        if let Some(p) = next_prime(n) {
            kani::assert(p >= n, "next_prime(n) >= n");
        }
    }
}
