//! Field vocabulary shared by the extractor and the filler.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Substituted for a list field when no row was extracted.
pub const NO_DATA: &str = "Tidak ada data";

/// Separator used when a list column is flattened into one field value.
pub const LIST_SEPARATOR: &str = ", ";

/// Every placeholder the letter template understands, in fill order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Field {
    NomorSurat,
    PerihalSurat,
    NamaPenerima,
    AlamatPenerima,
    IsiSurat,
    NamaPengirim,
    JabatanPengirim,
    NamaBarang,
    JumlahBarang,
    HargaSatuan,
    TotalBiaya,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::NomorSurat,
        Field::PerihalSurat,
        Field::NamaPenerima,
        Field::AlamatPenerima,
        Field::IsiSurat,
        Field::NamaPengirim,
        Field::JabatanPengirim,
        Field::NamaBarang,
        Field::JumlahBarang,
        Field::HargaSatuan,
        Field::TotalBiaya,
    ];

    pub const SCALARS: [Field; 7] = [
        Field::NomorSurat,
        Field::PerihalSurat,
        Field::NamaPenerima,
        Field::AlamatPenerima,
        Field::IsiSurat,
        Field::NamaPengirim,
        Field::JabatanPengirim,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Field::NomorSurat => "NOMOR_SURAT",
            Field::PerihalSurat => "PERIHAL_SURAT",
            Field::NamaPenerima => "NAMA_PENERIMA",
            Field::AlamatPenerima => "ALAMAT_PENERIMA",
            Field::IsiSurat => "ISI_SURAT",
            Field::NamaPengirim => "NAMA_PENGIRIM",
            Field::JabatanPengirim => "JABATAN_PENGIRIM",
            Field::NamaBarang => "NAMA_BARANG",
            Field::JumlahBarang => "JUMLAH_BARANG",
            Field::HargaSatuan => "HARGA_SATUAN",
            Field::TotalBiaya => "TOTAL_BIAYA",
        }
    }

    /// Label that introduces a scalar field in the purchase request.
    ///
    /// Recipient address and sender position share the `Jabatan` label, so
    /// both take the first `Jabatan:` line.
    pub fn label(self) -> Option<&'static str> {
        match self {
            Field::NomorSurat => Some("Nomor PR"),
            Field::PerihalSurat => Some("Keperluan"),
            Field::NamaPenerima => Some("Disetujui oleh"),
            Field::AlamatPenerima => Some("Jabatan"),
            Field::IsiSurat => Some("Alasan Pengadaan (Justifikasi)"),
            Field::NamaPengirim => Some("Pemohon"),
            Field::JabatanPengirim => Some("Jabatan"),
            _ => None,
        }
    }

    pub fn is_list(self) -> bool {
        self.label().is_none()
    }

    pub fn placeholder(self) -> String {
        format!("[{}]", self.key())
    }

    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Extracted values keyed by field; iteration follows [`Field::ALL`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<Field, String>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, value: impl Into<String>) {
        self.0.insert(field, value.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Scalar fields that no paragraph supplied.
    pub fn missing_scalars(&self) -> Vec<Field> {
        Field::SCALARS
            .into_iter()
            .filter(|f| !self.contains(*f))
            .collect()
    }
}

/// The purchase request's item table, one column per sequence.
///
/// Item/quantity rows and price/total rows come from separate sections and are
/// only aligned by position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineItemTable {
    pub items: Vec<String>,
    pub quantities: Vec<String>,
    pub unit_prices: Vec<String>,
    pub totals: Vec<String>,
}

impl LineItemTable {
    pub fn column(&self, field: Field) -> Option<&[String]> {
        match field {
            Field::NamaBarang => Some(&self.items),
            Field::JumlahBarang => Some(&self.quantities),
            Field::HargaSatuan => Some(&self.unit_prices),
            Field::TotalBiaya => Some(&self.totals),
            _ => None,
        }
    }

    /// Writes the four list fields into `map`, always present.
    pub fn write_into(&self, map: &mut FieldMap) {
        for field in Field::ALL.into_iter().filter(|f| f.is_list()) {
            let column = self.column(field).unwrap_or_default();
            map.insert(field, join_column(column));
        }
    }
}

pub fn join_column(values: &[String]) -> String {
    if values.is_empty() {
        NO_DATA.to_string()
    } else {
        values.join(LIST_SEPARATOR)
    }
}
