//! bincode-backed save states, plus serde helpers for the fixed-size arrays
//! that back the memory regions and frame buffers (serde's derive only
//! handles arrays up to 32 elements).

use crate::startup::EmulationState;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Formatter;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("error serializing/deserializing state: {source}")]
    Serialization {
        #[from]
        source: bincode::Error,
    },
    #[error("error reading/writing state: {source}")]
    FileSystem {
        #[from]
        source: io::Error,
    },
}

pub fn serialize_array<S, T, const N: usize>(
    array: &[T; N],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let mut tuple = serializer.serialize_tuple(N)?;
    for value in array {
        tuple.serialize_element(value)?;
    }
    tuple.end()
}

struct ArrayVisitor<T, const N: usize> {
    marker: PhantomData<T>,
}

impl<'de, T, const N: usize> Visitor<'de> for ArrayVisitor<T, N>
where
    T: Deserialize<'de> + Default + Copy,
{
    type Value = [T; N];

    fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "an array of size {N}")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut array = [T::default(); N];

        for (i, value) in array.iter_mut().enumerate() {
            let Some(element) = seq.next_element()? else {
                return Err(de::Error::custom(format!(
                    "expected array to have {N} elements, only got {i}"
                )));
            };
            *value = element;
        }

        Ok(array)
    }
}

pub fn deserialize_array<'de, D, T, const N: usize>(deserializer: D) -> Result<[T; N], D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default + Copy,
{
    deserializer.deserialize_tuple(N, ArrayVisitor { marker: PhantomData })
}

pub fn serialize_2d_array<S, T, const N: usize, const M: usize>(
    array: &[[T; M]; N],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let mut tuple = serializer.serialize_tuple(N * M)?;
    for row in array {
        for value in row {
            tuple.serialize_element(value)?;
        }
    }
    tuple.end()
}

struct Array2dVisitor<T, const N: usize, const M: usize> {
    marker: PhantomData<T>,
}

impl<'de, T, const N: usize, const M: usize> Visitor<'de> for Array2dVisitor<T, N, M>
where
    T: Deserialize<'de> + Default + Copy,
{
    type Value = [[T; M]; N];

    fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "a 2D array with {N} rows and {M} columns")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut array = [[T::default(); M]; N];

        for row in &mut array {
            for value in row.iter_mut() {
                let Some(element) = seq.next_element()? else {
                    return Err(de::Error::custom(format!("array has fewer than {N}*{M} elements")));
                };
                *value = element;
            }
        }

        Ok(array)
    }
}

pub fn deserialize_2d_array<'de, D, T, const N: usize, const M: usize>(
    deserializer: D,
) -> Result<[[T; M]; N], D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default + Copy,
{
    deserializer.deserialize_tuple(N * M, Array2dVisitor { marker: PhantomData })
}

pub fn determine_save_state_path(rom_file_path: &str) -> PathBuf {
    Path::new(rom_file_path).with_extension("state")
}

pub fn save_state<P: AsRef<Path>>(
    state: &EmulationState,
    path: P,
) -> Result<(), SaveStateError> {
    let serialized_state = bincode::serialize(state)?;
    fs::write(path.as_ref(), serialized_state)?;

    log::info!("Wrote save state to '{}'", path.as_ref().display());

    Ok(())
}

/// Load a save state, re-attaching the unserialized ROM/boot-ROM buffers
/// from the currently running state. On failure the running state is
/// returned unchanged alongside the error.
pub fn load_state<P: AsRef<Path>>(
    path: P,
    existing_state: EmulationState,
) -> Result<EmulationState, (SaveStateError, Box<EmulationState>)> {
    let serialized_state = match fs::read(path.as_ref()) {
        Ok(serialized_state) => serialized_state,
        Err(err) => return Err((err.into(), Box::new(existing_state))),
    };

    let mut state: EmulationState = match bincode::deserialize(&serialized_state) {
        Ok(state) => state,
        Err(err) => return Err((err.into(), Box::new(existing_state))),
    };

    state.address_space.move_unserializable_fields_from(existing_state.address_space);

    log::info!("Loaded save state from '{}'", path.as_ref().display());

    Ok(state)
}
