//! 规则表达式：告警条件与校验条件共用，基于 evalexpr。
//!
//! 语法要点：
//! - 字面量：整数、浮点、双引号字符串、true / false，`null` 为空值常量
//! - 变量：`value`、`numericValue`，读数字段以 `reading.signalId` 形式访问
//! - 运算符：`||`、`&&`、`==` `!=`、`<` `<=` `>` `>=`、`+` `-` `*` `/` `%` `^`、`!`、一元 `-`
//! - 函数：evalexpr 内置函数（`len`、`str::to_lowercase` 等），以及
//!   `str::starts_with`、`str::ends_with`、`str::contains`、`str::equals_ignore_case`
//!
//! 编译或求值失败（语法错误、未知变量、类型不匹配、整数除零、嵌套过深）一律按 false 处理，
//! 单条规则失效不会中断一次轮询。

mod context;

pub use context::Variables;

use evalexpr::{Node, Value as ExprValue, build_operator_tree};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// 括号与变量对象的最大嵌套层数。
pub const MAX_NESTING: usize = 64;
/// 表达式原文长度上限（字节）。
pub const MAX_SOURCE_LEN: usize = 1024;
/// 语法树深度上限，求值递归不超过此深度。
const MAX_TREE_DEPTH: usize = MAX_NESTING * 4;

/// 表达式编译/求值错误。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("empty expression")]
    Empty,
    #[error("expression longer than {MAX_SOURCE_LEN} bytes: {0}")]
    TooLong(usize),
    #[error("expression nested too deeply")]
    TooDeep,
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

type Compiled = Result<Arc<Node>, EvalError>;

/// 规则表达式。首次求值时编译并缓存（含编译失败结果）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Expression {
    #[serde(rename = "expression")]
    pub source: String,
    pub description: Option<String>,
    #[serde(skip)]
    compiled: OnceLock<Compiled>,
}

impl Expression {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn compiled(&self) -> &Compiled {
        self.compiled.get_or_init(|| compile(&self.source).map(Arc::new))
    }

    /// 编译检查，不求值。
    pub fn compile(&self) -> Result<(), EvalError> {
        self.compiled().as_ref().map(|_| ()).map_err(Clone::clone)
    }

    /// 求值并返回原始结果。
    pub fn try_evaluate(&self, vars: &Variables) -> Result<ExprValue, EvalError> {
        let node = self.compiled().as_ref().map_err(Clone::clone)?;
        node.eval_with_context(vars.context())
            .map_err(|err| EvalError::Evaluation(err.to_string()))
    }

    /// 布尔求值：失败为 false；非布尔结果按字符串 "true"（忽略大小写）判定。
    pub fn evaluate(&self, vars: &Variables) -> bool {
        match self.try_evaluate(vars) {
            Ok(ExprValue::Boolean(flag)) => flag,
            Ok(ExprValue::String(text)) => text.trim().eq_ignore_ascii_case("true"),
            Ok(other) => other.to_string().eq_ignore_ascii_case("true"),
            Err(err) => {
                tracing::debug!(
                    target: "acq.expression",
                    expression = %self.source,
                    error = %err,
                    "expression_evaluation_failed"
                );
                false
            }
        }
    }

    /// 一次性求值（不缓存编译结果）。
    pub fn evaluate_static(source: &str, vars: &Variables) -> bool {
        Self::new(source).evaluate(vars)
    }
}

fn compile(source: &str) -> Result<Node, EvalError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(EvalError::Empty);
    }
    if source.len() > MAX_SOURCE_LEN {
        return Err(EvalError::TooLong(source.len()));
    }
    check_parentheses(source)?;
    let node = build_operator_tree(source).map_err(|err| EvalError::Syntax(err.to_string()))?;
    if tree_depth(&node) > MAX_TREE_DEPTH {
        return Err(EvalError::TooDeep);
    }
    Ok(node)
}

/// 建树前检查括号层数（跳过字符串字面量）。
fn check_parentheses(source: &str) -> Result<(), EvalError> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for ch in source.chars() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '(' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(EvalError::TooDeep);
                }
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

/// 语法树深度，显式栈遍历。
fn tree_depth(root: &Node) -> usize {
    let mut deepest = 0;
    let mut pending = vec![(root, 1usize)];
    while let Some((node, depth)) = pending.pop() {
        deepest = deepest.max(depth);
        pending.extend(node.children().iter().map(|child| (child, depth + 1)));
    }
    deepest
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn vars(value: Value) -> Variables {
        match value {
            Value::Object(map) => Variables::from_json(&map),
            _ => panic!("variables must be an object"),
        }
    }

    #[test]
    fn compares_numbers_and_combines_with_logic() {
        let context = vars(json!({
            "temperature": 18.0,
            "humidity": 75.0,
            "systemMode": "OVERRIDE",
            "manualFlag": true
        }));
        let expression = Expression::new(
            "temperature > 20 && humidity < 80 || (systemMode == \"OVERRIDE\" && manualFlag)",
        );
        assert!(expression.evaluate(&context));
        assert!(!Expression::evaluate_static(
            "temperature > 20 && humidity < 80",
            &context
        ));
    }

    #[test]
    fn string_functions_and_reading_fields() {
        let context = vars(json!({
            "value": "ERR_CONNECTION",
            "errorCode": 0,
            "reading": {"signalId": "temp-1", "valid": true}
        }));
        assert!(Expression::evaluate_static(
            "str::starts_with(value, \"ERR\") || errorCode > 0",
            &context
        ));
        assert!(Expression::evaluate_static(
            "str::ends_with(reading.signalId, \"-1\") && reading.valid",
            &context
        ));
        assert!(Expression::evaluate_static(
            "str::contains(value, \"CONN\") && str::equals_ignore_case(value, \"err_connection\")",
            &context
        ));
        assert!(Expression::evaluate_static("len(value) == 14", &context));
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        let context = vars(json!({"value": 60.5, "count": 3}));
        assert!(Expression::evaluate_static("value > 50", &context));
        assert!(Expression::evaluate_static("value == 60.5", &context));
        assert!(Expression::evaluate_static("count < value && count >= 3", &context));
    }

    #[test]
    fn arithmetic_follows_precedence() {
        let context = vars(json!({"a": 2, "b": 3}));
        assert!(Expression::evaluate_static("a + b * 2 == 8", &context));
        assert!(Expression::evaluate_static("(a + b) * 2 == 10", &context));
        assert!(Expression::evaluate_static("-a + 7 % 4 == 1", &context));
        assert!(Expression::evaluate_static("!(a > b)", &context));
    }

    #[test]
    fn failures_evaluate_to_false() {
        let context = vars(json!({"value": null, "n": 5, "text": "60.5"}));
        assert!(!Expression::evaluate_static("not valid syntax {{", &context));
        assert!(!Expression::evaluate_static("", &context));
        assert!(!Expression::evaluate_static("missing > 1", &context));
        assert!(!Expression::evaluate_static("value > 1", &context));
        assert!(!Expression::evaluate_static("n / 0 > 1", &context));
        assert!(!Expression::evaluate_static("n > true", &context));
        assert!(!Expression::evaluate_static("text > 50", &context));
        assert!(Expression::evaluate_static("value == null", &context));
    }

    #[test]
    fn non_boolean_results_use_truthy_string() {
        let context = vars(json!({"flag": "TRUE", "n": 1}));
        assert!(Expression::evaluate_static("flag", &context));
        assert!(!Expression::evaluate_static("n", &context));
    }

    #[test]
    fn deep_nesting_is_rejected_without_recursing() {
        let context = Variables::new();
        let huge = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(!Expression::evaluate_static(&huge, &context));
        assert_eq!(
            Expression::new(huge).compile(),
            Err(EvalError::TooLong(200_001))
        );

        let nested = format!("{}1{} == 1", "(".repeat(100), ")".repeat(100));
        assert_eq!(Expression::new(nested).compile(), Err(EvalError::TooDeep));

        let negations = format!("{}true", "!".repeat(MAX_SOURCE_LEN - 4));
        assert!(!Expression::evaluate_static(&negations, &context));

        let shallow = format!("{}1{} == 1", "(".repeat(8), ")".repeat(8));
        assert!(Expression::evaluate_static(&shallow, &context));
    }

    #[test]
    fn parentheses_inside_strings_are_not_counted() {
        let context = vars(json!({"value": "x"}));
        let source = format!("value != \"{}\"", "(".repeat(MAX_NESTING * 2));
        assert!(Expression::evaluate_static(&source, &context));
    }

    #[test]
    fn compilation_failure_is_memoised() {
        let expression = Expression::new("(a > 1");
        let first = expression.compile().expect_err("syntax error");
        let second = expression.compile().expect_err("syntax error");
        assert_eq!(first, second);
        assert!(matches!(first, EvalError::Syntax(_)));
    }

    #[test]
    fn serialized_form_skips_compiled_cache() {
        let expression = Expression::new("numericValue > 50").with_description("high");
        assert!(expression.evaluate(&vars(json!({"numericValue": 60}))));
        let encoded = serde_json::to_value(&expression).expect("serialize");
        assert_eq!(
            encoded,
            json!({"expression": "numericValue > 50", "description": "high"})
        );
    }
}
