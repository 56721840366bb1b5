//! Style expressions.
//!
//! Style values assigned to features are tagged expression trees evaluated
//! against a feature's properties, rather than opaque callbacks. This keeps
//! the store's public contract data-only: expressions serialize with the
//! feature, can be inspected, and evaluate deterministically.
//!
//! # Example
//!
//! ```
//! use mapedit::style::{StyleExpr, ArithOp, CmpOp};
//! use mapedit::geom::{Feature, Geometry, LonLat};
//!
//! // width = if properties.lanes > 2 { 8 } else { 4 }
//! let width = StyleExpr::cond(
//!     StyleExpr::cmp(CmpOp::Gt, StyleExpr::prop("lanes"), StyleExpr::lit(2)),
//!     StyleExpr::lit(8),
//!     StyleExpr::lit(4),
//! );
//!
//! let road = Feature::new(Geometry::Point(LonLat::new(0.0, 0.0))).prop("lanes", 3);
//! assert_eq!(width.eval(&road), serde_json::json!(8));
//! ```

use crate::geom::Feature;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Named style expressions, e.g. `{"stroke": …, "width": …}`.
pub type StyleMap = BTreeMap<String, StyleExpr>;

/// Arithmetic operators for numeric style expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Comparison operators producing booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A style expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum StyleExpr {
    /// A literal JSON value.
    Literal {
        /// The value.
        value: Value,
    },
    /// Looks up a feature property by name; missing properties yield null.
    Prop {
        /// Property name.
        name: String,
    },
    /// Arithmetic over two numeric sub-expressions.
    Arith {
        /// Operator.
        arith: ArithOp,
        /// Left operand.
        lhs: Box<StyleExpr>,
        /// Right operand.
        rhs: Box<StyleExpr>,
    },
    /// Comparison of two sub-expressions.
    Cmp {
        /// Operator.
        cmp: CmpOp,
        /// Left operand.
        lhs: Box<StyleExpr>,
        /// Right operand.
        rhs: Box<StyleExpr>,
    },
    /// Conditional: evaluates `then` when `test` is truthy, else `otherwise`.
    Cond {
        /// Condition expression.
        test: Box<StyleExpr>,
        /// Value when the condition holds.
        then: Box<StyleExpr>,
        /// Value when it does not.
        otherwise: Box<StyleExpr>,
    },
}

impl StyleExpr {
    /// Literal constructor.
    pub fn lit(value: impl Into<Value>) -> Self {
        StyleExpr::Literal { value: value.into() }
    }

    /// Property-lookup constructor.
    pub fn prop(name: &str) -> Self {
        StyleExpr::Prop { name: name.to_string() }
    }

    /// Arithmetic constructor.
    pub fn arith(op: ArithOp, lhs: StyleExpr, rhs: StyleExpr) -> Self {
        StyleExpr::Arith {
            arith: op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Comparison constructor.
    pub fn cmp(op: CmpOp, lhs: StyleExpr, rhs: StyleExpr) -> Self {
        StyleExpr::Cmp {
            cmp: op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Conditional constructor.
    pub fn cond(test: StyleExpr, then: StyleExpr, otherwise: StyleExpr) -> Self {
        StyleExpr::Cond {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Evaluates the expression against a feature.
    ///
    /// Type mismatches degrade to `null` rather than failing: style
    /// evaluation happens per frame per feature and must not abort the
    /// render pass.
    pub fn eval(&self, feature: &Feature) -> Value {
        match self {
            StyleExpr::Literal { value } => value.clone(),
            StyleExpr::Prop { name } => {
                feature.properties.get(name).cloned().unwrap_or(Value::Null)
            }
            StyleExpr::Arith { arith, lhs, rhs } => {
                let (Some(a), Some(b)) =
                    (lhs.eval(feature).as_f64(), rhs.eval(feature).as_f64())
                else {
                    return Value::Null;
                };
                let out = match arith {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => {
                        if b == 0.0 {
                            return Value::Null;
                        }
                        a / b
                    }
                };
                number(out)
            }
            StyleExpr::Cmp { cmp, lhs, rhs } => {
                let (a, b) = (lhs.eval(feature), rhs.eval(feature));
                let result = match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => match cmp {
                        CmpOp::Eq => x == y,
                        CmpOp::Ne => x != y,
                        CmpOp::Lt => x < y,
                        CmpOp::Le => x <= y,
                        CmpOp::Gt => x > y,
                        CmpOp::Ge => x >= y,
                    },
                    // Non-numeric operands: only equality is meaningful.
                    _ => match cmp {
                        CmpOp::Eq => a == b,
                        CmpOp::Ne => a != b,
                        _ => false,
                    },
                };
                Value::Bool(result)
            }
            StyleExpr::Cond { test, then, otherwise } => {
                if truthy(&test.eval(feature)) {
                    then.eval(feature)
                } else {
                    otherwise.eval(feature)
                }
            }
        }
    }
}

/// Resolves a feature's style map to concrete values.
///
/// This is what the rendering layer consumes; features without style
/// overrides resolve to an empty map and fall back to layer defaults.
pub fn resolve_style(feature: &Feature) -> BTreeMap<String, Value> {
    feature
        .style
        .as_ref()
        .map(|style| {
            style
                .iter()
                .map(|(k, expr)| (k.clone(), expr.eval(feature)))
                .collect()
        })
        .unwrap_or_default()
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Converts an f64 back to a JSON number, preferring integer form.
fn number(x: f64) -> Value {
    if x.fract() == 0.0 && x.abs() < (i64::MAX as f64) {
        Value::from(x as i64)
    } else {
        serde_json::Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Geometry, LonLat};
    use serde_json::json;

    fn road(lanes: i64) -> Feature {
        Feature::new(Geometry::Point(LonLat::new(0.0, 0.0))).prop("lanes", lanes)
    }

    #[test]
    fn test_literal_and_prop() {
        let f = road(2);
        assert_eq!(StyleExpr::lit("red").eval(&f), json!("red"));
        assert_eq!(StyleExpr::prop("lanes").eval(&f), json!(2));
        assert_eq!(StyleExpr::prop("missing").eval(&f), Value::Null);
    }

    #[test]
    fn test_arith() {
        let f = road(3);
        let width = StyleExpr::arith(ArithOp::Mul, StyleExpr::prop("lanes"), StyleExpr::lit(4));
        assert_eq!(width.eval(&f), json!(12));

        let div0 = StyleExpr::arith(ArithOp::Div, StyleExpr::lit(1), StyleExpr::lit(0));
        assert_eq!(div0.eval(&f), Value::Null);
    }

    #[test]
    fn test_arith_non_numeric_is_null() {
        let f = road(1);
        let bad = StyleExpr::arith(ArithOp::Add, StyleExpr::lit("x"), StyleExpr::lit(1));
        assert_eq!(bad.eval(&f), Value::Null);
    }

    #[test]
    fn test_cmp_and_cond() {
        let wide = StyleExpr::cond(
            StyleExpr::cmp(CmpOp::Gt, StyleExpr::prop("lanes"), StyleExpr::lit(2)),
            StyleExpr::lit(8),
            StyleExpr::lit(4),
        );
        assert_eq!(wide.eval(&road(3)), json!(8));
        assert_eq!(wide.eval(&road(2)), json!(4));
    }

    #[test]
    fn test_string_equality() {
        let f = Feature::new(Geometry::Point(LonLat::new(0.0, 0.0))).prop("kind", "park");
        let is_park = StyleExpr::cmp(CmpOp::Eq, StyleExpr::prop("kind"), StyleExpr::lit("park"));
        assert_eq!(is_park.eval(&f), json!(true));
    }

    #[test]
    fn test_resolve_style() {
        let mut f = road(3);
        let mut style = StyleMap::new();
        style.insert("width".to_string(), StyleExpr::prop("lanes"));
        style.insert("color".to_string(), StyleExpr::lit("grey"));
        f.style = Some(style);

        let resolved = resolve_style(&f);
        assert_eq!(resolved["width"], json!(3));
        assert_eq!(resolved["color"], json!("grey"));
        assert!(resolve_style(&road(1)).is_empty());
    }

    #[test]
    fn test_expr_serde_roundtrip() {
        let expr = StyleExpr::cond(
            StyleExpr::cmp(CmpOp::Ge, StyleExpr::prop("lanes"), StyleExpr::lit(2)),
            StyleExpr::arith(ArithOp::Mul, StyleExpr::prop("lanes"), StyleExpr::lit(3)),
            StyleExpr::lit(3),
        );
        let json = serde_json::to_string(&expr).unwrap();
        let back: StyleExpr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
    }
}
