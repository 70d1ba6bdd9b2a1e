//! Scalar chemistry vocabulary shared by every layer of the crate.
//!
//! Elements, bond multiplicities, drawn stereo markers, and the coordinate aliases live here
//! so that parsers, ranking, stereo assignment, and the archive agree on one representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cartesian point in three dimensions (ångströms for conformers, drawing units otherwise).
pub type Point = nalgebra::Point3<f64>;

/// Planar point as laid out in a structure drawing.
pub type Point2 = nalgebra::Point2<f64>;

const SYMBOLS: [&str; 119] = [
    "*", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
    "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd",
    "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm",
    "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn",
    "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Chemical element identified by its atomic number.
///
/// Atomic number `0` is the dummy/unknown element (`*`). Ordering follows the atomic number,
/// which is the primary criterion of substituent priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Element(u8);

impl Element {
    pub const UNKNOWN: Element = Element(0);
    pub const H: Element = Element(1);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const F: Element = Element(9);
    pub const P: Element = Element(15);
    pub const S: Element = Element(16);
    pub const CL: Element = Element(17);
    pub const BR: Element = Element(35);
    pub const I: Element = Element(53);

    /// Builds an element from its atomic number, rejecting numbers beyond oganesson.
    pub fn from_atomic_number(number: u8) -> Option<Self> {
        (usize::from(number) < SYMBOLS.len()).then_some(Self(number))
    }

    /// Looks up an element by symbol. Matching is case-sensitive except for an all-lowercase
    /// single-letter form, which drawings occasionally use for aromatic labels.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim();
        if let Some(pos) = SYMBOLS.iter().position(|s| *s == symbol) {
            return Some(Self(pos as u8));
        }
        let mut chars = symbol.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_lowercase() => {
                let upper = c.to_ascii_uppercase().to_string();
                SYMBOLS
                    .iter()
                    .position(|s| *s == upper)
                    .map(|pos| Self(pos as u8))
            }
            _ => None,
        }
    }

    pub fn atomic_number(&self) -> u8 {
        self.0
    }

    pub fn symbol(&self) -> &'static str {
        SYMBOLS[usize::from(self.0)]
    }

    pub fn is_hydrogen(&self) -> bool {
        self.0 == 1
    }
}

impl Default for Element {
    fn default() -> Self {
        Element::C
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl TryFrom<u8> for Element {
    type Error = String;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Element::from_atomic_number(number).ok_or_else(|| format!("Invalid atomic number: {}", number))
    }
}

impl From<Element> for u8 {
    fn from(element: Element) -> Self {
        element.0
    }
}

impl FromStr for Element {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(number) = s.trim().parse::<u8>() {
            return Element::from_atomic_number(number)
                .ok_or_else(|| format!("Invalid atomic number: {}", s));
        }
        Element::from_symbol(s).ok_or_else(|| format!("Invalid element symbol: {}", s))
    }
}

/// Bond multiplicity as drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    pub fn value(&self) -> f64 {
        match self {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Aromatic => 1.5,
        }
    }

    /// Twice the bond order, keeping aromatic bonds integral for degree invariants.
    pub fn doubled(&self) -> u32 {
        match self {
            BondOrder::Single => 2,
            BondOrder::Double => 4,
            BondOrder::Triple => 6,
            BondOrder::Aromatic => 3,
        }
    }

    /// Number of times a neighbor is counted when exploring substituents, following the
    /// duplicate-atom convention for multiple bonds. Aromatic bonds count once.
    pub fn multiplicity(&self) -> usize {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        }
    }
}

impl fmt::Display for BondOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl FromStr for BondOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "1.0" | "Single" => Ok(BondOrder::Single),
            "2" | "2.0" | "Double" => Ok(BondOrder::Double),
            "3" | "3.0" | "Triple" => Ok(BondOrder::Triple),
            "1.5" | "Aromatic" => Ok(BondOrder::Aromatic),
            _ => Err(format!("Invalid bond order: {}", s)),
        }
    }
}

/// Drawn out-of-plane marker of a bond. The narrow end of a wedge or hash is the bond's
/// `begin` atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BondStereo {
    #[default]
    None,
    /// Solid wedge: the wide end points toward the viewer.
    Wedge,
    /// Hashed wedge: the wide end points away from the viewer.
    Hash,
}

impl BondStereo {
    pub fn is_marked(&self) -> bool {
        !matches!(self, BondStereo::None)
    }
}

impl fmt::Display for BondStereo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            BondStereo::None => "None",
            BondStereo::Wedge => "Wedge",
            BondStereo::Hash => "Hash",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_symbol_returns_correct_value() {
        assert_eq!(Element::H.symbol(), "H");
        assert_eq!(Element::C.symbol(), "C");
        assert_eq!(Element::BR.symbol(), "Br");
        assert_eq!(Element::from_atomic_number(118).unwrap().symbol(), "Og");
        assert_eq!(Element::UNKNOWN.symbol(), "*");
    }

    #[test]
    fn element_from_atomic_number_rejects_out_of_range() {
        assert!(Element::from_atomic_number(119).is_none());
        assert_eq!(Element::from_atomic_number(26).unwrap().symbol(), "Fe");
    }

    #[test]
    fn element_from_str_parses_symbols_and_numbers() {
        assert_eq!(Element::from_str("Cl").unwrap(), Element::CL);
        assert_eq!(Element::from_str("17").unwrap(), Element::CL);
        assert_eq!(Element::from_str(" O ").unwrap(), Element::O);
        assert_eq!(Element::from_str("n").unwrap(), Element::N);
        assert!(Element::from_str("Zz").is_err());
        assert!(Element::from_str("200").is_err());
    }

    #[test]
    fn element_deserialization_rejects_out_of_range_numbers() {
        assert_eq!(serde_json::to_string(&Element::CL).unwrap(), "17");
        assert_eq!(serde_json::from_str::<Element>("35").unwrap(), Element::BR);
        assert!(serde_json::from_str::<Element>("200").is_err());
        assert!(serde_json::from_str::<Element>("119").is_err());
    }

    #[test]
    fn element_ordering_follows_atomic_number() {
        assert!(Element::BR > Element::CL);
        assert!(Element::CL > Element::O);
        assert!(Element::O > Element::H);
    }

    #[test]
    fn bond_order_value_and_doubled_agree() {
        for order in [
            BondOrder::Single,
            BondOrder::Double,
            BondOrder::Triple,
            BondOrder::Aromatic,
        ] {
            assert_eq!(order.doubled() as f64, order.value() * 2.0);
        }
    }

    #[test]
    fn bond_order_from_str_parses_valid_inputs() {
        assert_eq!(BondOrder::from_str("1").unwrap(), BondOrder::Single);
        assert_eq!(BondOrder::from_str("2").unwrap(), BondOrder::Double);
        assert_eq!(BondOrder::from_str("3.0").unwrap(), BondOrder::Triple);
        assert_eq!(BondOrder::from_str("1.5").unwrap(), BondOrder::Aromatic);
        assert!(BondOrder::from_str("4").is_err());
    }

    #[test]
    fn bond_order_multiplicity_duplicates_multiple_bonds() {
        assert_eq!(BondOrder::Single.multiplicity(), 1);
        assert_eq!(BondOrder::Double.multiplicity(), 2);
        assert_eq!(BondOrder::Triple.multiplicity(), 3);
        assert_eq!(BondOrder::Aromatic.multiplicity(), 1);
    }

    #[test]
    fn bond_stereo_marked_only_for_wedge_and_hash() {
        assert!(!BondStereo::None.is_marked());
        assert!(BondStereo::Wedge.is_marked());
        assert!(BondStereo::Hash.is_marked());
    }
}
