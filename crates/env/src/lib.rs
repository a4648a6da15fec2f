use std::{collections::HashMap, path::PathBuf, process::Command};

use mempipe::{Settings, Strategy};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{
        IntoDeserializer, Visitor,
        value::{MapDeserializer, StringDeserializer},
    },
    forward_to_deserialize_any,
};
use serde_json::Value;

pub trait EnvVars {
    const PREFIX: &'static str;
}

/// Overrides for [`Settings`], e.g. `MEMPIPE_STRATEGY=temp-file`.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsVars {
    pub strategy: Option<Strategy>,

    pub proc_root: Option<PathBuf>,

    pub temp_dir: Option<PathBuf>,

    pub poll_interval_ms: Option<u64>,
}

impl EnvVars for SettingsVars {
    const PREFIX: &'static str = "MEMPIPE_";
}

impl From<SettingsVars> for Settings {
    fn from(vars: SettingsVars) -> Self {
        Settings {
            strategy: vars.strategy,
            proc_root: vars.proc_root,
            temp_dir: vars.temp_dir,
            poll_interval_ms: vars.poll_interval_ms,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// The program is expected to read the path.
    Read,

    /// The program is expected to write the path.
    Write,
}

/// Describes the fake path to the program it was made for.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakePathVars {
    /// The path the program should open.
    pub path: PathBuf,

    pub direction: Direction,

    /// How the path is backed, `pipe` or `temp-file`.
    pub strategy: Strategy,
}

impl EnvVars for FakePathVars {
    const PREFIX: &'static str = "MEMPIPE_FAKE_";
}

pub trait CommandExt {
    fn with_env_vars(&mut self, vars: impl EnvVars + Serialize) -> &mut Self;
}

impl CommandExt for Command {
    fn with_env_vars(&mut self, vars: impl EnvVars + Serialize) -> &mut Self {
        serialize_into_command(vars, self);
        self
    }
}

pub fn deserialize_from_env<'de, T: Deserialize<'de> + EnvVars>() -> Result<T, serde_json::Error> {
    deserialize(
        std::env::vars()
            .filter(|(k, _)| k.starts_with(T::PREFIX))
            .map(|(k, v)| (k.trim_start_matches(T::PREFIX).to_ascii_lowercase(), v)),
    )
}

/// Values are read as JSON when they parse as such, and as plain strings
/// otherwise, so `MEMPIPE_TEMP_DIR=/tmp` needs no quoting. Fields that expect
/// a string always get the raw value, even if it looks like a number.
pub fn deserialize<'de, T: Deserialize<'de>>(
    input: impl IntoIterator<Item = (String, String)>,
) -> Result<T, serde_json::Error> {
    T::deserialize(MapDeserializer::new(
        input.into_iter().map(|(k, v)| (k, EnvValue(v))),
    ))
}

/// A single variable's value.
struct EnvValue(String);

impl<'de> IntoDeserializer<'de, serde_json::Error> for EnvValue {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

impl<'de> Deserializer<'de> for EnvValue {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match serde_json::from_str::<Value>(&self.0) {
            Ok(value) => value.deserialize_any(visitor),
            Err(_) => visitor.visit_string(self.0),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_string(self.0)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_string(self.0)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_string(self.0)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        let variant: StringDeserializer<serde_json::Error> = self.0.into_deserializer();
        visitor.visit_enum(variant)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char bytes byte_buf
        unit unit_struct seq tuple tuple_struct map struct ignored_any
    }
}

/// Strings are emitted verbatim and `None` values are skipped, so programs
/// can use the variables without decoding them.
pub fn serialize<T: Serialize>(input: T) -> Result<HashMap<String, String>, serde_json::Error> {
    let value = serde_json::to_value(input)?;
    let map: HashMap<String, Value> = serde_json::from_value(value)?;

    let serialized_map: HashMap<String, String> = map
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .flat_map(|(k, v)| match v {
            Value::String(s) => Ok((k, s)),
            v => serde_json::to_string(&v).map(|serialized| (k, serialized)),
        })
        .collect();

    Ok(serialized_map)
}

pub fn serialize_into_command<T: Serialize + EnvVars>(data: T, command: &mut Command) {
    let map = serialize(data).expect("failed to serialize env vars");
    for (k, v) in map {
        command.env(format!("{}{}", T::PREFIX, k.to_ascii_uppercase()), v);
    }
}
