use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

/// An exact rational number backing all numeric keyword comparisons.
///
/// JSON Schema treats `5`, `5.0` and `5.00` as the same number, and
/// `multipleOf` must hold exactly for integer instances too large for an
/// `f64` mantissa, so comparisons go through big-integer arithmetic rather
/// than floats. The denominator is always positive and the fraction is
/// reduced, which makes derived equality and hashing canonical.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Rational {
    num: BigInt,
    den: BigInt,
}

impl Rational {
    fn new(mut num: BigInt, mut den: BigInt) -> Self {
        if den.is_negative() {
            num = -num;
            den = -den;
        }

        let g = gcd(&num, &den);
        if !g.is_zero() && !g.is_one() {
            num /= &g;
            den /= &g;
        }

        Rational { num, den }
    }

    pub fn from_number(n: &Number) -> Option<Self> {
        if let Some(i) = n.as_i64() {
            Some(Rational::new(BigInt::from(i), BigInt::one()))
        } else if let Some(u) = n.as_u64() {
            Some(Rational::new(BigInt::from(u), BigInt::one()))
        } else {
            n.as_f64().and_then(Rational::from_f64)
        }
    }

    /// Exact conversion: every finite `f64` is mantissa * 2^exponent.
    pub fn from_f64(f: f64) -> Option<Self> {
        if !f.is_finite() {
            return None;
        }

        let bits = f.to_bits();
        let negative = bits >> 63 == 1;
        let raw_exponent = ((bits >> 52) & 0x7ff) as i64;
        let fraction = bits & ((1u64 << 52) - 1);

        let (mantissa, exponent) = if raw_exponent == 0 {
            (fraction, -1074)
        } else {
            (fraction | (1 << 52), raw_exponent - 1075)
        };

        let mut num = BigInt::from(mantissa);
        if negative {
            num = -num;
        }

        if exponent >= 0 {
            Some(Rational::new(num << exponent as usize, BigInt::one()))
        } else {
            Some(Rational::new(num, BigInt::one() << (-exponent) as usize))
        }
    }

    pub fn is_multiple_of(&self, quantum: &Self) -> bool {
        if quantum.num.is_zero() {
            return false;
        }

        ((&self.num * &quantum.den) % (&self.den * &quantum.num)).is_zero()
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        // Denominators are positive, so cross-multiplying preserves order.
        (&self.num * &other.den).cmp(&(&other.num * &self.den))
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn gcd(a: &BigInt, b: &BigInt) -> BigInt {
    let mut a = a.abs();
    let mut b = b.abs();
    while !b.is_zero() {
        let r = &a % &b;
        a = b;
        b = r;
    }
    a
}

pub(crate) fn is_integer_number(n: &Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
}

/// The JSON type name of an instance. A number with a zero fractional part
/// is an `integer`, a subtype of `number`.
pub(crate) fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if is_integer_number(n) {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Structural equality with numeric equivalence: `5` equals `5.0`, arrays
/// compare pairwise, objects compare by key set with equal values.
pub(crate) fn equal_values(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            match (Rational::from_number(x), Rational::from_number(y)) {
                (Some(p), Some(q)) => p == q,
                _ => false,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(v, w)| equal_values(v, w))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map_or(false, |w| equal_values(v, w)))
        }
        _ => a == b,
    }
}

/// A hash consistent with [`equal_values`]. Numbers are canonicalized to
/// rational form, arrays hash as length-then-items, objects hash
/// order-independently by XOR of per-entry hashes. The `RandomState` seeds
/// the hash per `uniqueItems` check.
pub(crate) fn hash_value(state: &RandomState, v: &Value) -> u64 {
    let mut hasher = state.build_hasher();
    hash_value_into(state, v, &mut hasher);
    hasher.finish()
}

fn hash_value_into<H: Hasher>(state: &RandomState, v: &Value, hasher: &mut H) {
    match v {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(b) => {
            1u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Number(n) => {
            2u8.hash(hasher);
            match Rational::from_number(n) {
                Some(r) => r.hash(hasher),
                None => n.to_string().hash(hasher),
            }
        }
        Value::String(s) => {
            3u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Array(items) => {
            4u8.hash(hasher);
            items.len().hash(hasher);
            for item in items {
                hash_value_into(state, item, hasher);
            }
        }
        Value::Object(members) => {
            5u8.hash(hasher);
            members.len().hash(hasher);
            let mut combined = 0u64;
            for (key, value) in members {
                let mut entry = state.build_hasher();
                key.hash(&mut entry);
                hash_value_into(state, value, &mut entry);
                combined ^= entry.finish();
            }
            combined.hash(hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rational(v: Value) -> Rational {
        match v {
            Value::Number(n) => Rational::from_number(&n).unwrap(),
            _ => panic!("not a number"),
        }
    }

    #[test]
    fn numeric_equivalence() {
        assert_eq!(rational(json!(5)), rational(json!(5.0)));
        assert_eq!(rational(json!(-3)), rational(json!(-3.0)));
        assert_ne!(rational(json!(5)), rational(json!(5.5)));
        assert!(equal_values(&json!(5), &json!(5.0)));
        assert!(!equal_values(&json!(1), &json!("1")));
    }

    #[test]
    fn ordering() {
        assert!(rational(json!(0.5)) < rational(json!(1)));
        assert!(rational(json!(-1)) < rational(json!(0.25)));
        assert!(rational(json!(u64::MAX)) > rational(json!(i64::MAX)));
    }

    #[test]
    fn multiples() {
        assert!(rational(json!(10)).is_multiple_of(&rational(json!(5))));
        assert!(rational(json!(7.5)).is_multiple_of(&rational(json!(2.5))));
        assert!(!rational(json!(7)).is_multiple_of(&rational(json!(2))));
        // Exact even where f64 math would wobble.
        assert!(rational(json!(1000000000000000000u64)).is_multiple_of(&rational(json!(10))));
        assert!(!rational(json!(5)).is_multiple_of(&rational(json!(0))));
    }

    #[test]
    fn type_names() {
        assert_eq!("integer", type_name(&json!(5)));
        assert_eq!("integer", type_name(&json!(5.0)));
        assert_eq!("number", type_name(&json!(5.5)));
        assert_eq!("null", type_name(&json!(null)));
        assert_eq!("object", type_name(&json!({})));
    }

    #[test]
    fn hash_consistent_with_equality() {
        let state = RandomState::new();
        assert_eq!(hash_value(&state, &json!(5)), hash_value(&state, &json!(5.0)));
        assert_eq!(
            hash_value(&state, &json!({"a": 1, "b": [2, 3]})),
            hash_value(&state, &json!({"b": [2, 3.0], "a": 1.0}))
        );
        assert_ne!(hash_value(&state, &json!(1)), hash_value(&state, &json!("1")));
    }
}
