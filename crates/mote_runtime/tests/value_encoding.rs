use proptest::prelude::*;

use mote_runtime::Value;

proptest! {
    #[test]
    fn number_round_trips(f in proptest::num::f64::ANY) {
        let v = Value::number(f);
        prop_assert!(v.is_number());
        let back = v.as_number();
        if f.is_nan() {
            prop_assert!(back.is_nan());
        } else {
            prop_assert_eq!(back.to_bits(), f.to_bits());
        }
    }

    #[test]
    fn numbers_never_classify_as_tagged(f in proptest::num::f64::ANY) {
        let v = Value::number(f);
        prop_assert!(!v.is_object());
        prop_assert!(!v.is_string());
        prop_assert!(!v.is_function());
        prop_assert!(!v.is_boolean());
        prop_assert!(!v.is_null());
        prop_assert!(!v.is_undefined());
    }
}

#[test]
fn negative_infinity_is_a_number() {
    let v = Value::number(f64::NEG_INFINITY);
    assert!(v.is_number());
    assert_eq!(v.as_number(), f64::NEG_INFINITY);
}

#[test]
fn nan_is_canonicalized() {
    // Any NaN input collapses to one pattern, so payload bits can never
    // masquerade as a tagged value.
    let weird = f64::from_bits(0x7ff8_0000_0000_1234);
    let v = Value::number(weird);
    assert!(v.is_number());
    assert!(v.as_number().is_nan());
    assert_eq!(v.bits(), Value::number(f64::NAN).bits());
}

#[test]
fn singletons_are_distinct() {
    let vals = [Value::NULL, Value::UNDEFINED, Value::TRUE, Value::FALSE];
    for (i, a) in vals.iter().enumerate() {
        for (j, b) in vals.iter().enumerate() {
            assert_eq!(i == j, a.bits() == b.bits());
        }
    }
    assert!(Value::NULL.is_null());
    assert!(Value::UNDEFINED.is_undefined());
    assert!(Value::TRUE.as_boolean());
    assert!(!Value::FALSE.as_boolean());
}

#[test]
fn checked_accessors_reject_mismatched_kinds() {
    assert!(Value::TRUE.try_number().is_err());
    assert!(Value::number(1.0).try_boolean().is_err());
    assert!(Value::NULL.try_foreign().is_err());
    assert_eq!(Value::number(2.5).try_number().unwrap(), 2.5);
    assert!(Value::TRUE.try_boolean().unwrap());
}

#[test]
fn foreign_pointers_round_trip() {
    let raw = 0x0000_7f12_3456_789au64 as *mut ();
    let v = Value::foreign(raw);
    assert!(v.is_foreign());
    assert_eq!(v.as_foreign(), raw);
    assert_eq!(v.type_name(), "foreign");
}
