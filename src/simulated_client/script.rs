use crate::error_handling::types::WireError;
use crate::wire::{ArrayValue, Credentials, Decimal, HashScheme, Parameter, Value};

/// What a call is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Success,
    Failure,
    /// Sent without waiting for an answer.
    NoResponse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedCall {
    pub procedure: String,
    pub params: Vec<Parameter>,
    pub expect: Expectation,
}

impl ScriptedCall {
    pub fn new(procedure: impl Into<String>, params: Vec<Parameter>, expect: Expectation) -> Self {
        Self {
            procedure: procedure.into(),
            params,
            expect,
        }
    }
}

/// A login followed by a fixed list of calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientScript {
    pub name: String,
    pub credentials: Credentials,
    pub scheme: HashScheme,
    pub calls: Vec<ScriptedCall>,
}

impl ClientScript {
    /// Insert a greeting, insert it again to hit the unique constraint, read it
    /// back, then ask the server to shut down.
    pub fn hello_world(name: impl Into<String>, credentials: Credentials, scheme: HashScheme) -> Self {
        let insert = || {
            vec![
                Parameter::from("Hello"),
                Parameter::from("World"),
                Parameter::from("English"),
            ]
        };
        Self {
            name: name.into(),
            credentials,
            scheme,
            calls: vec![
                ScriptedCall::new("Insert", insert(), Expectation::Success),
                ScriptedCall::new("Insert", insert(), Expectation::Failure),
                ScriptedCall::new("Select", vec!["English".into()], Expectation::Success),
                ScriptedCall::new("@Shutdown", Vec::new(), Expectation::NoResponse),
            ],
        }
    }

    /// Anonymous login and a single call to `foo` carrying an array of every
    /// array-capable type, a null and one scalar of every type.
    pub fn all_params() -> Result<Self, WireError> {
        let pi: Decimal = "3.1459".parse()?;
        let decimals = vec!["3".parse::<Decimal>()?, "3.14".parse::<Decimal>()?, pi];

        let params: Vec<Parameter> = vec![
            ArrayValue::String(vec!["oh".to_string(), "noes".to_string()]).into(),
            ArrayValue::TinyInt(vec![22, 33, 44]).into(),
            ArrayValue::SmallInt(vec![22, 33, 44]).into(),
            ArrayValue::Integer(vec![22, 33, 44]).into(),
            ArrayValue::BigInt(vec![22, 33, 44]).into(),
            ArrayValue::Float(vec![3.0, 3.1, 3.14, 3.1459]).into(),
            ArrayValue::Timestamp(vec![33, 44]).into(),
            ArrayValue::Decimal(decimals).into(),
            Value::Null.into(),
            "ohnoes!".into(),
            Value::TinyInt(22).into(),
            Value::SmallInt(22).into(),
            Value::Integer(22).into(),
            Value::BigInt(22).into(),
            Value::Float(3.1459).into(),
            Value::Timestamp(33).into(),
            Value::Decimal(pi).into(),
        ];

        Ok(Self {
            name: "all_params".to_string(),
            credentials: Credentials::anonymous(),
            scheme: HashScheme::Sha256,
            calls: vec![ScriptedCall::new("foo", params, Expectation::Failure)],
        })
    }
}
