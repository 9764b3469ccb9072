//! 表达式变量上下文：JSON 值转换为 evalexpr 变量，嵌套对象按 `a.b` 展开。

use super::MAX_NESTING;
use evalexpr::{
    Context, ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprResult, Function,
    HashMapContext, Value as ExprValue,
};
use serde_json::Value;

/// 一次求值使用的变量集合（含字符串辅助函数与 `null` 常量）。
pub struct Variables {
    context: HashMapContext,
}

impl Default for Variables {
    fn default() -> Self {
        Self::new()
    }
}

impl Variables {
    pub fn new() -> Self {
        let mut context = HashMapContext::new();
        register_string_functions(&mut context);
        let mut vars = Self { context };
        vars.set("null".to_string(), ExprValue::Empty);
        vars
    }

    /// 以 JSON 对象的每个字段为变量。
    pub fn from_json(fields: &serde_json::Map<String, Value>) -> Self {
        let mut vars = Self::new();
        for (name, value) in fields {
            vars.insert(name, value);
        }
        vars
    }

    /// 写入变量；对象字段展开为 `name.field`，超过嵌套上限的部分丢弃。
    pub fn insert(&mut self, name: &str, value: &Value) {
        self.insert_nested(name.to_string(), value, 0);
    }

    pub fn get(&self, name: &str) -> Option<&ExprValue> {
        self.context.get_value(name)
    }

    pub(crate) fn context(&self) -> &HashMapContext {
        &self.context
    }

    fn insert_nested(&mut self, name: String, value: &Value, depth: usize) {
        match value {
            Value::Object(fields) => {
                if depth >= MAX_NESTING {
                    return;
                }
                for (key, field) in fields {
                    self.insert_nested(format!("{name}.{key}"), field, depth + 1);
                }
            }
            other => {
                let converted = to_expr_value(other, depth);
                self.set(name, converted);
            }
        }
    }

    fn set(&mut self, name: String, value: ExprValue) {
        // 同名变量换类型会被拒绝
        if let Err(err) = self.context.set_value(name, value) {
            tracing::debug!(target: "acq.expression", error = %err, "variable_rejected");
        }
    }
}

fn to_expr_value(value: &Value, depth: usize) -> ExprValue {
    match value {
        Value::Null => ExprValue::Empty,
        Value::Bool(flag) => ExprValue::Boolean(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(int) => ExprValue::Int(int),
            None => number.as_f64().map_or(ExprValue::Empty, ExprValue::Float),
        },
        Value::String(text) => ExprValue::String(text.clone()),
        Value::Array(items) if depth < MAX_NESTING => ExprValue::Tuple(
            items
                .iter()
                .map(|item| to_expr_value(item, depth + 1))
                .collect(),
        ),
        Value::Array(_) | Value::Object(_) => ExprValue::Empty,
    }
}

fn string_pair(argument: &ExprValue) -> EvalexprResult<(String, String)> {
    let pair = argument.as_fixed_len_tuple(2)?;
    Ok((pair[0].as_string()?, pair[1].as_string()?))
}

fn register_string_functions(context: &mut HashMapContext) {
    let predicates: [(&str, fn(&str, &str) -> bool); 4] = [
        ("str::starts_with", |text, prefix| text.starts_with(prefix)),
        ("str::ends_with", |text, suffix| text.ends_with(suffix)),
        ("str::contains", |text, needle| text.contains(needle)),
        ("str::equals_ignore_case", |left, right| {
            left.eq_ignore_ascii_case(right)
        }),
    ];
    for (name, predicate) in predicates {
        let function = Function::new(move |argument: &ExprValue| {
            let (left, right) = string_pair(argument)?;
            Ok(ExprValue::Boolean(predicate(&left, &right)))
        });
        if let Err(err) = context.set_function(name.to_string(), function) {
            tracing::debug!(target: "acq.expression", function = name, error = %err, "function_rejected");
        }
    }
}
