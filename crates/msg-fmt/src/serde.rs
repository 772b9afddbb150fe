use serde::{Deserialize, Serialize};

use crate::{errors::CodecError, payload::NotePayload};

/// Wire form of [`NotePayload`]: hex segments under fixed keys.
#[derive(Serialize, Deserialize)]
struct NotePayloadRepr {
    data0: String,
    data1: String,
    data2: String,
    data3: String,
    data4: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locktime: Option<u32>,
}

impl From<&NotePayload> for NotePayloadRepr {
    fn from(p: &NotePayload) -> Self {
        let [d0, d1, d2, d3, d4] = p.segments().each_ref().map(hex::encode);
        Self {
            data0: d0,
            data1: d1,
            data2: d2,
            data3: d3,
            data4: d4,
            locktime: p.locktime(),
        }
    }
}

impl TryFrom<NotePayloadRepr> for NotePayload {
    type Error = CodecError;

    fn try_from(r: NotePayloadRepr) -> Result<Self, Self::Error> {
        let segments = [
            hex::decode(r.data0)?,
            hex::decode(r.data1)?,
            hex::decode(r.data2)?,
            hex::decode(r.data3)?,
            hex::decode(r.data4)?,
        ];
        NotePayload::new(segments, r.locktime)
    }
}

impl Serialize for NotePayload {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        NotePayloadRepr::from(self).serialize(s)
    }
}

impl<'de> Deserialize<'de> for NotePayload {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let repr = NotePayloadRepr::deserialize(d)?;
        NotePayload::try_from(repr).map_err(serde::de::Error::custom)
    }
}
