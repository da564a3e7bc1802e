//! Static per-residue property tables.
//!
//! Every table is a `const` array indexed by [`AminoAcid`], so lookups are
//! total and allocation-free. Symbols outside the 20-letter alphabet (gaps,
//! `X`, padding, lowercase) resolve to the documented per-property default
//! instead of failing.

use serde::{Deserialize, Serialize};

/// The 20 standard amino acids, in alphabetical one-letter order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AminoAcid {
    A,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    K,
    L,
    M,
    N,
    P,
    Q,
    R,
    S,
    T,
    V,
    W,
    Y,
}

impl AminoAcid {
    /// All residues in table order.
    pub const ALL: [AminoAcid; 20] = [
        Self::A,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::I,
        Self::K,
        Self::L,
        Self::M,
        Self::N,
        Self::P,
        Self::Q,
        Self::R,
        Self::S,
        Self::T,
        Self::V,
        Self::W,
        Self::Y,
    ];

    /// Parse an uppercase one-letter code. Anything else is `None`.
    pub fn from_char(c: char) -> Option<Self> {
        let aa = match c {
            'A' => Self::A,
            'C' => Self::C,
            'D' => Self::D,
            'E' => Self::E,
            'F' => Self::F,
            'G' => Self::G,
            'H' => Self::H,
            'I' => Self::I,
            'K' => Self::K,
            'L' => Self::L,
            'M' => Self::M,
            'N' => Self::N,
            'P' => Self::P,
            'Q' => Self::Q,
            'R' => Self::R,
            'S' => Self::S,
            'T' => Self::T,
            'V' => Self::V,
            'W' => Self::W,
            'Y' => Self::Y,
            _ => return None,
        };
        Some(aa)
    }

    pub fn as_char(self) -> char {
        match self {
            Self::A => 'A',
            Self::C => 'C',
            Self::D => 'D',
            Self::E => 'E',
            Self::F => 'F',
            Self::G => 'G',
            Self::H => 'H',
            Self::I => 'I',
            Self::K => 'K',
            Self::L => 'L',
            Self::M => 'M',
            Self::N => 'N',
            Self::P => 'P',
            Self::Q => 'Q',
            Self::R => 'R',
            Self::S => 'S',
            Self::T => 'T',
            Self::V => 'V',
            Self::W => 'W',
            Self::Y => 'Y',
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Value of `property` for this residue.
    pub fn property(self, property: Property) -> f64 {
        property.table()[self.index()]
    }
}

/// A per-residue property with its own lookup table and fallback value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    /// Kyte-Doolittle hydropathy.
    Hydrophobicity,
    /// Free amino acid mass in Daltons, used as a size proxy.
    MolecularWeight,
    /// Side-chain charge at pH 7 (histidine counted as +0.1).
    Charge,
    /// 1 for residues with an aromatic ring.
    Aromatic,
    /// 1 for polar residues.
    Polar,
    /// BLOSUM62 diagonal (self-substitution) score.
    BlosumSelf,
    /// Approximate background frequency in the human proteome.
    BackgroundFrequency,
}

impl Property {
    /// The five physicochemical properties reported at the mutation site.
    pub const SITE: [Property; 5] = [
        Self::Hydrophobicity,
        Self::MolecularWeight,
        Self::Charge,
        Self::Aromatic,
        Self::Polar,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Hydrophobicity => "hydrophobicity",
            Self::MolecularWeight => "molecular_weight",
            Self::Charge => "charge",
            Self::Aromatic => "aromatic",
            Self::Polar => "polar",
            Self::BlosumSelf => "blosum_self",
            Self::BackgroundFrequency => "background_frequency",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hydrophobicity" => Some(Self::Hydrophobicity),
            "molecular_weight" => Some(Self::MolecularWeight),
            "charge" => Some(Self::Charge),
            "aromatic" => Some(Self::Aromatic),
            "polar" => Some(Self::Polar),
            "blosum_self" => Some(Self::BlosumSelf),
            "background_frequency" => Some(Self::BackgroundFrequency),
            _ => None,
        }
    }

    /// Value returned for residues outside the alphabet.
    pub fn default_value(self) -> f64 {
        match self {
            Self::BlosumSelf => 4.0,
            Self::BackgroundFrequency => 0.01,
            _ => 0.0,
        }
    }

    fn table(self) -> &'static [f64; 20] {
        match self {
            Self::Hydrophobicity => &HYDROPHOBICITY,
            Self::MolecularWeight => &MOLECULAR_WEIGHT,
            Self::Charge => &CHARGE,
            Self::Aromatic => &AROMATIC,
            Self::Polar => &POLAR,
            Self::BlosumSelf => &BLOSUM62_SELF,
            Self::BackgroundFrequency => &BACKGROUND_FREQUENCY,
        }
    }
}

// Tables follow `AminoAcid::ALL` order: A C D E F G H I K L M N P Q R S T V W Y.

const HYDROPHOBICITY: [f64; 20] = [
    1.8, 2.5, -3.5, -3.5, 2.8, -0.4, -3.2, 4.5, -3.9, 3.8, 1.9, -3.5, -1.6, -3.5, -4.5, -0.8, -0.7,
    4.2, -0.9, -1.3,
];

const MOLECULAR_WEIGHT: [f64; 20] = [
    89.0, 121.0, 133.0, 147.0, 165.0, 75.0, 155.0, 131.0, 146.0, 131.0, 149.0, 132.0, 115.0, 146.0,
    174.0, 105.0, 119.0, 117.0, 204.0, 181.0,
];

const CHARGE: [f64; 20] = [
    0.0, 0.0, -1.0, -1.0, 0.0, 0.0, 0.1, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0,
    0.0,
];

const AROMATIC: [f64; 20] = [
    0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    1.0,
];

const POLAR: [f64; 20] = [
    0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0,
    1.0,
];

const BLOSUM62_SELF: [f64; 20] = [
    4.0, 9.0, 6.0, 5.0, 6.0, 6.0, 8.0, 4.0, 5.0, 4.0, 5.0, 6.0, 7.0, 5.0, 5.0, 4.0, 5.0, 4.0, 11.0,
    7.0,
];

const BACKGROUND_FREQUENCY: [f64; 20] = [
    0.074, 0.033, 0.059, 0.058, 0.040, 0.074, 0.026, 0.038, 0.072, 0.076, 0.018, 0.044, 0.050,
    0.037, 0.042, 0.081, 0.062, 0.068, 0.013, 0.033,
];

/// Look up `property` for a single residue symbol.
///
/// Total over every `char`: unknown symbols yield [`Property::default_value`].
pub fn lookup(residue: char, property: Property) -> f64 {
    match AminoAcid::from_char(residue) {
        Some(aa) => aa.property(property),
        None => property.default_value(),
    }
}

/// Look up a property by its table name. Unknown property names yield `0.0`.
pub fn lookup_named(residue: char, property_name: &str) -> f64 {
    Property::from_name(property_name)
        .map(|p| lookup(residue, p))
        .unwrap_or(0.0)
}
