use std::{fmt::Display, ops::Deref, str::FromStr};

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use rocket::{
    form::{self, prelude::ErrorKind, FromFormField, ValueField},
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

/// A database ID. Stored as a native `ObjectId`; travels through the JSON
/// API as a hex string (see [`serde_hex`]).
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(ObjectId);

impl Id {
    /// Generate a fresh, unique ID.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// A filter document matching this ID.
    pub fn as_doc(&self) -> Document {
        doc! { "_id": self.0 }
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Id {
    type Target = ObjectId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl FromStr for Id {
    type Err = mongodb::bson::oid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse::<ObjectId>()?))
    }
}

impl From<ObjectId> for Id {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl From<Id> for Bson {
    fn from(id: Id) -> Self {
        Bson::ObjectId(id.0)
    }
}

impl<'a> FromParam<'a> for Id {
    type Error = mongodb::bson::oid::Error;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse::<Id>()
    }
}

#[rocket::async_trait]
impl<'r> FromFormField<'r> for Id {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        field.value.parse::<ObjectId>().map(Id).map_err(|err| {
            let error = ErrorKind::Custom(Box::new(err));
            error.into()
        })
    }
}

impl UriDisplay<Path> for Id {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl_from_uri_param_identity!([Path] Id);

/// Serialize an [`Id`] as a plain hex string, for the JSON API.
pub mod serde_hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Id;

    pub fn serialize<S: Serializer>(id: &Id, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Id, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(D::Error::custom)
    }

    /// The same, for optional IDs.
    pub mod option {
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        use super::super::Id;

        pub fn serialize<S: Serializer>(id: &Option<Id>, serializer: S) -> Result<S::Ok, S::Error> {
            match id {
                Some(id) => serializer.serialize_some(&id.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Id>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|hex| hex.parse().map_err(D::Error::custom))
                .transpose()
        }
    }
}

/// Serialize a map keyed and valued by [`Id`]s as a JSON object of hex strings.
pub mod serde_hex_map {
    use std::collections::HashMap;

    use serde::{de::Error, ser::SerializeMap, Deserialize, Deserializer, Serializer};

    use super::Id;

    pub fn serialize<S: Serializer>(map: &HashMap<Id, Id>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut ser_map = serializer.serialize_map(Some(map.len()))?;
        for (k, v) in map {
            ser_map.serialize_entry(&k.to_string(), &v.to_string())?;
        }
        ser_map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<Id, Id>, D::Error> {
        let raw = HashMap::<String, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| {
                let k = k.parse().map_err(D::Error::custom)?;
                let v = v.parse().map_err(D::Error::custom)?;
                Ok((k, v))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "serde_hex")]
        id: Id,
        #[serde(with = "serde_hex::option")]
        maybe: Option<Id>,
    }

    #[test]
    fn ids_travel_as_hex_strings() {
        let wrapper = Wrapper {
            id: Id::new(),
            maybe: None,
        };
        let json = serde_json::to_value(&wrapper).unwrap();
        assert_eq!(json["id"], wrapper.id.to_string());
        assert!(json["maybe"].is_null());

        let back: Wrapper = serde_json::from_value(json).unwrap();
        assert_eq!(back, wrapper);
    }

    #[test]
    fn malformed_hex_is_rejected() {
        let json = serde_json::json!({ "id": "not-an-id", "maybe": null });
        assert!(serde_json::from_value::<Wrapper>(json).is_err());
    }
}
