use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use venture_finance_core::valuation::dcf;
use venture_finance_core::{Assumptions, VentureFinanceError};

// ===========================================================================
// DCF building blocks
// ===========================================================================

#[test]
fn test_pv_undiscounted_sum() {
    let pv = dcf::present_value(&[dec!(100), dec!(100), dec!(100)], Decimal::ZERO).unwrap();
    assert_eq!(pv, dec!(300));
}

#[test]
fn test_pv_ten_percent_annuity() {
    // 100 / 1.1 + 100 / 1.21 + 100 / 1.331 = 248.685...
    let pv = dcf::present_value(&[dec!(100), dec!(100), dec!(100)], dec!(0.10)).unwrap();
    assert!(
        (pv - dec!(248.6852)).abs() < dec!(0.001),
        "Expected PV ~248.69, got {pv}"
    );
}

#[test]
fn test_terminal_value_undefined_at_equal_rates() {
    assert_eq!(dcf::terminal_value(dec!(100), dec!(0.05), dec!(0.05)).unwrap(), None);
}

#[test]
fn test_roi_none_without_investment() {
    assert_eq!(dcf::investor_roi(dec!(5000), dec!(0.1), Decimal::ZERO).unwrap(), None);
}

// ===========================================================================
// Exit chain
// ===========================================================================

fn exit_input() -> dcf::ExitInput {
    dcf::ExitInput {
        cash_flows: vec![dec!(500), dec!(800), dec!(1200), dec!(1500)],
        discount_rate: dec!(0.12),
        growth_rate: dec!(0.03),
        investor_share: dec!(0.15),
        invested_amount: dec!(1000),
    }
}

#[test]
fn test_exit_chain_matches_building_blocks() {
    let input = exit_input();
    let out = dcf::analyze_exit(&input).unwrap().result;

    let pv = dcf::present_value(&input.cash_flows, input.discount_rate).unwrap();
    let tv = dcf::terminal_value(dec!(1500), input.growth_rate, input.discount_rate)
        .unwrap()
        .unwrap();
    let ev = dcf::exit_valuation(pv, Some(tv)).unwrap();
    let roi = dcf::investor_roi(ev, input.investor_share, input.invested_amount).unwrap();

    assert_eq!(out.pv_cash_flows, pv);
    assert_eq!(out.terminal_value, tv);
    assert_eq!(out.exit_valuation, ev);
    assert_eq!(out.investor_roi, roi);
}

#[test]
fn test_exit_infeasible_rates_are_modeling_errors() {
    let mut input = exit_input();
    input.discount_rate = dec!(0.03);
    assert!(matches!(
        dcf::analyze_exit(&input),
        Err(VentureFinanceError::FinancialImpossibility(_))
    ));
}

#[test]
fn test_exit_invalid_share_is_validation_error() {
    let mut input = exit_input();
    input.investor_share = dec!(-0.1);
    assert!(matches!(
        dcf::analyze_exit(&input),
        Err(VentureFinanceError::InvalidInput { .. })
    ));
}

#[test]
fn test_exit_input_filled_from_assumptions() {
    let mut raw = serde_json::json!({
        "cash_flows": ["500", "800"],
        "investor_share": "0.1",
        "invested_amount": "100"
    });
    Assumptions::default().fill_exit_defaults(&mut raw);
    let input: dcf::ExitInput = serde_json::from_value(raw).unwrap();
    assert_eq!(input.discount_rate, dec!(0.12));
    assert_eq!(input.growth_rate, dec!(0.03));
}
