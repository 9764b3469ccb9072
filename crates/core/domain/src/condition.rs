//! 告警条件与校验条件。

use crate::expression::{Expression, Variables};
use crate::reading::Reading;
use serde::{Deserialize, Serialize};

/// 告警等级（有序：INFO < WARNING < MINOR < MAJOR < CRITICAL）。
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmSeverity {
    #[default]
    Info,
    Warning,
    Minor,
    Major,
    Critical,
}

/// 条件公共字段。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Condition {
    pub id: Option<String>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub expression: Option<Expression>,
}

impl Condition {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(Expression::new(expression)),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// 可求值条件：以读数构造变量上下文后对表达式求值。
pub trait Evaluable {
    fn condition(&self) -> &Condition;

    /// 无表达式视为不命中。
    fn evaluate(&self, vars: &Variables) -> bool {
        self.condition()
            .expression
            .as_ref()
            .is_some_and(|expression| expression.evaluate(vars))
    }

    fn evaluate_reading(&self, reading: &Reading) -> bool {
        self.evaluate(&reading.variables())
    }
}

/// 告警条件：命中即标记读数告警。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlarmCondition {
    #[serde(flatten)]
    pub condition: Condition,
    pub severity: AlarmSeverity,
}

impl AlarmCondition {
    pub fn new(expression: impl Into<String>, severity: AlarmSeverity) -> Self {
        Self {
            condition: Condition::new(expression),
            severity,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.condition.description = Some(description.into());
        self
    }

    /// 告警文案：描述优先，其次名称、编码、表达式原文。
    pub fn message(&self) -> String {
        let condition = &self.condition;
        condition
            .description
            .clone()
            .or_else(|| condition.name.clone())
            .or_else(|| condition.code.clone())
            .or_else(|| condition.expression.as_ref().map(|e| e.source.clone()))
            .unwrap_or_default()
    }
}

impl Evaluable for AlarmCondition {
    fn condition(&self) -> &Condition {
        &self.condition
    }
}

/// 校验条件：不满足即标记读数无效。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidateCondition {
    #[serde(flatten)]
    pub condition: Condition,
}

impl ValidateCondition {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            condition: Condition::new(expression),
        }
    }

    /// 无表达式的校验条件不约束读数。
    pub fn is_satisfied_by(&self, vars: &Variables) -> bool {
        self.condition.expression.is_none() || self.evaluate(vars)
    }
}

impl Evaluable for ValidateCondition {
    fn condition(&self) -> &Condition {
        &self.condition
    }
}
