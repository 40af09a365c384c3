use aero_x86::{Rde, Width};
use proptest::prelude::*;

#[test]
fn rexw_wins_over_osz() {
    let rde = Rde::zero().with_rex_w(true).with_osz(true);
    assert_eq!(rde.operand_width(Width::W32), Width::W64);
}

#[test]
fn osz_without_rexw_selects_16_bit() {
    let rde = Rde::zero().with_osz(true);
    assert_eq!(rde.operand_width(Width::W32), Width::W16);
}

#[test]
fn neither_bit_falls_back_to_default() {
    let rde = Rde::zero();
    assert_eq!(rde.operand_width(Width::W32), Width::W32);
    assert_eq!(rde.operand_width(Width::W16), Width::W16);
}

#[test]
fn modrm_register_form_folds_rex_b() {
    let rde = Rde::zero().with_modrm(0b11, 0, 0b001).with_rex_b(true);
    assert!(rde.is_modrm_register());
    assert_eq!(rde.rm_rexb(), 0b1001);
}

#[test]
fn modrm_reg_field_folds_rex_r() {
    let rde = Rde::zero().with_modrm(0b01, 0b010, 0).with_rex_r(true);
    assert_eq!(rde.reg_rexr(), 0b1010);
}

proptest! {
    #[test]
    fn modrm_fields_round_trip(m in 0u8..4, reg in 0u8..8, rm in 0u8..8) {
        let rde = Rde::zero().with_modrm(m, reg, rm);
        prop_assert_eq!(rde.modrm_mod(), m);
        prop_assert_eq!(rde.modrm_reg(), reg);
        prop_assert_eq!(rde.modrm_rm(), rm);
        prop_assert_eq!(rde.is_modrm_register(), m == 0b11);
    }
}
