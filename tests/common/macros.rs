/// Asserts that two floats agree within a relative tolerance.
#[macro_export]
macro_rules! assert_close {
    ($actual:expr, $expected:expr, $rel:expr) => {
        let actual: f64 = $actual;
        let expected: f64 = $expected;
        let scale = expected.abs().max(1e-300);
        assert!(
            ((actual - expected) / scale).abs() <= $rel,
            "{} = {} differs from {} by more than {} (relative)",
            stringify!($actual),
            actual,
            expected,
            $rel
        );
    };
}

/// Asserts that every value of a substrate field is non-negative.
#[macro_export]
macro_rules! assert_non_negative {
    ($space:expr, $substrate:expr) => {
        let field = $space.field($substrate).unwrap();
        assert!(
            field.grid().values().iter().all(|&v| v >= 0.0),
            "field '{}' holds a negative concentration",
            $substrate
        );
    };
}
