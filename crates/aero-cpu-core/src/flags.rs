//! C2: flag predicates (spec.md §4.2). These feed Jcc/CMOVcc/SETcc/LOOPcc
//! uniformly through [`crate::interp::scalar::Condition`].

use crate::state::Flags;

pub fn is_parity(flags: Flags) -> bool {
    flags.contains(Flags::PF)
}

pub fn is_below_or_equal(flags: Flags) -> bool {
    flags.contains(Flags::CF) || flags.contains(Flags::ZF)
}

pub fn is_above(flags: Flags) -> bool {
    !flags.contains(Flags::CF) && !flags.contains(Flags::ZF)
}

pub fn is_less(flags: Flags) -> bool {
    flags.contains(Flags::SF) != flags.contains(Flags::OF)
}

pub fn is_greater_or_equal(flags: Flags) -> bool {
    flags.contains(Flags::SF) == flags.contains(Flags::OF)
}

pub fn is_less_or_equal(flags: Flags) -> bool {
    flags.contains(Flags::ZF) || (flags.contains(Flags::SF) != flags.contains(Flags::OF))
}

pub fn is_greater(flags: Flags) -> bool {
    !flags.contains(Flags::ZF) && (flags.contains(Flags::SF) == flags.contains(Flags::OF))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags_for(cf: bool, zf: bool, sf: bool, of: bool, pf: bool) -> Flags {
        let mut f = Flags::empty();
        f.set(Flags::CF, cf);
        f.set(Flags::ZF, zf);
        f.set(Flags::SF, sf);
        f.set(Flags::OF, of);
        f.set(Flags::PF, pf);
        f
    }

    #[test]
    fn predicates_match_their_definitions_exhaustively() {
        for cf in [false, true] {
            for zf in [false, true] {
                for sf in [false, true] {
                    for of in [false, true] {
                        for pf in [false, true] {
                            let f = flags_for(cf, zf, sf, of, pf);
                            assert_eq!(is_parity(f), pf);
                            assert_eq!(is_below_or_equal(f), cf || zf);
                            assert_eq!(is_above(f), !cf && !zf);
                            assert_eq!(is_less(f), sf != of);
                            assert_eq!(is_greater_or_equal(f), sf == of);
                            assert_eq!(is_less_or_equal(f), zf || (sf != of));
                            assert_eq!(is_greater(f), !zf && (sf == of));
                        }
                    }
                }
            }
        }
    }
}
