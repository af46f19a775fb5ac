//! Variables, literals and three-valued truth values.
//!
//! A literal packs a variable and a polarity into a single `u32`:
//!
//! ```text
//! lit = (var << 1) | neg_bit
//! ```
//!
//! so that the complement of a literal is `lit ^ 1` and its variable is `lit >> 1`.
//! The same encoding is used by the formula factory (where variables are
//! factory-issued identifiers) and by the solvers (where variables are solver
//! indices); the owner of a literal decides which space it lives in.
use std::fmt;
use std::ops::Neg;

/// A variable identifier (0-indexed).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Creates a new variable with the given ID.
    pub const fn new(id: u32) -> Self {
        Var(id)
    }

    /// Returns the raw variable ID as a `u32`.
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the variable ID as a `usize`, convenient for indexing.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Positive literal of this variable.
    pub const fn pos(self) -> Lit {
        Lit::new(self, true)
    }

    /// Negative literal of this variable.
    pub const fn neg(self) -> Lit {
        Lit::new(self, false)
    }

    /// Literal of this variable with the given phase.
    pub const fn lit(self, phase: bool) -> Lit {
        Lit::new(self, phase)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

/// A literal: a variable together with a polarity.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Lit(u32);

impl Lit {
    /// Creates a literal of `var`; `phase == true` is the positive literal.
    pub const fn new(var: Var, phase: bool) -> Self {
        Lit((var.0 << 1) | (!phase) as u32)
    }

    /// Creates a literal from its raw code.
    pub const fn from_code(code: u32) -> Self {
        Lit(code)
    }

    /// Returns the raw code `(var << 1) | neg_bit`.
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Returns the raw code as a `usize`, convenient for indexing.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn var(self) -> Var {
        Var(self.0 >> 1)
    }

    pub const fn is_negated(self) -> bool {
        self.0 & 1 == 1
    }

    pub const fn is_positive(self) -> bool {
        !self.is_negated()
    }

    /// The value the variable takes when this literal is true.
    pub const fn phase(self) -> bool {
        self.is_positive()
    }

    pub const fn negate(self) -> Self {
        Lit(self.0 ^ 1)
    }

    /// Creates a literal from a signed DIMACS integer.
    ///
    /// DIMACS variables are 1-indexed, so `1` is the positive literal of `Var(0)`.
    pub fn from_dimacs(value: i32) -> Self {
        assert_ne!(value, 0, "DIMACS literal must be non-zero");
        Var::new(value.unsigned_abs() - 1).lit(value > 0)
    }

    /// Signed DIMACS representation (1-indexed).
    pub fn to_dimacs(self) -> i32 {
        let v = (self.var().id() + 1) as i32;
        if self.is_negated() {
            -v
        } else {
            v
        }
    }
}

impl Neg for Lit {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negated() {
            write!(f, "~{}", self.var())
        } else {
            write!(f, "{}", self.var())
        }
    }
}

/// Three-valued truth value of a literal under a partial assignment.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Tristate {
    False,
    True,
    Undef,
}

impl Tristate {
    pub const fn from_bool(value: bool) -> Self {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }

    pub const fn negate(self) -> Self {
        match self {
            Tristate::False => Tristate::True,
            Tristate::True => Tristate::False,
            Tristate::Undef => Tristate::Undef,
        }
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tristate::False => write!(f, "FALSE"),
            Tristate::True => write!(f, "TRUE"),
            Tristate::Undef => write!(f, "UNDEF"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lit_encoding() {
        let v = Var::new(5);
        assert_eq!(v.pos().code(), 10);
        assert_eq!(v.neg().code(), 11);
        assert_eq!(v.pos().var(), v);
        assert_eq!(v.neg().var(), v);
        assert_eq!(-v.pos(), v.neg());
        assert_eq!(v.pos().negate().code(), v.pos().code() ^ 1);
    }

    #[test]
    fn test_lit_polarity() {
        let v = Var::new(0);
        assert!(v.pos().is_positive());
        assert!(!v.pos().is_negated());
        assert!(v.neg().is_negated());
        assert!(v.lit(true).phase());
        assert!(!v.lit(false).phase());
    }

    #[test]
    fn test_dimacs() {
        assert_eq!(Lit::from_dimacs(1), Var::new(0).pos());
        assert_eq!(Lit::from_dimacs(-3), Var::new(2).neg());
        assert_eq!(Lit::from_dimacs(-3).to_dimacs(), -3);
        assert_eq!(Lit::from_dimacs(7).to_dimacs(), 7);
    }

    #[test]
    fn test_display() {
        assert_eq!(Var::new(2).pos().to_string(), "x2");
        assert_eq!(Var::new(2).neg().to_string(), "~x2");
    }

    #[test]
    fn test_tristate() {
        assert_eq!(Tristate::from_bool(true), Tristate::True);
        assert_eq!(Tristate::True.negate(), Tristate::False);
        assert_eq!(Tristate::Undef.negate(), Tristate::Undef);
    }
}
