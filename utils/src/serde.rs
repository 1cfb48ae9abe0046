use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub type SerdePathError = serde_path_to_error::Error<serde_json::Error>;

pub trait SerdeResponseParse {
    type Error;

    fn serde_parse_custom<T>(self) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned;
}

impl SerdeResponseParse for &Value {
    type Error = crate::Error;

    fn serde_parse_custom<T>(self) -> Result<T, crate::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        if let Ok(s) = serde_json::to_string(&self) {
            Ok(serde_path_to_error::deserialize(
                &mut serde_json::Deserializer::from_str(&s),
            )?)
        } else {
            serde_json::from_value(self.clone())
                .map_err(|e| crate::Error::SerdeJsonValueParseFailed(self.clone(), e))
        }
    }
}

pub trait SerdeResponseParseAsync {
    type Error;

    fn serde_parse_custom<T>(
        self,
    ) -> impl std::future::Future<Output = Result<T, Self::Error>> + Send
    where
        T: serde::de::DeserializeOwned;
}

impl SerdeResponseParseAsync for &str {
    type Error = SerdePathError;

    async fn serde_parse_custom<T>(self) -> Result<T, SerdePathError>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_str(self))
    }
}

/// Block explorers encode every number as a JSON string, e.g. `"blockNumber": "19482011"`.
pub fn u64_from_str<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.trim().parse::<u64>().map_err(serde::de::Error::custom)
}
