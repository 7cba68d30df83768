//! Product descriptors and their issuer-qualified form.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::{Party, PartyAndReference};

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A kind of goody, e.g. `NOUGAT`.
///
/// The name is normalised to upper case on construction, so `"Nougat"`,
/// `"NOUGAT"` and `"nougat"` all name the same product. On the wire a
/// token is the object `{"type": "NOUGAT"}`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "TokenRepr", into = "TokenRepr")]
pub struct Token {
    name: String,
}

#[derive(Serialize, Deserialize)]
struct TokenRepr {
    #[serde(rename = "type")]
    kind: String,
}

impl From<TokenRepr> for Token {
    fn from(repr: TokenRepr) -> Self {
        Token::new(repr.kind)
    }
}

impl From<Token> for TokenRepr {
    fn from(token: Token) -> Self {
        TokenRepr { kind: token.name }
    }
}

impl Token {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().trim().to_uppercase(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualifies this product with the issuer that minted it.
    pub fn issued_by(&self, issuer: PartyAndReference) -> IssuedToken {
        IssuedToken {
            issuer,
            product: self.clone(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.name)
    }
}

// ---------------------------------------------------------------------------
// IssuedToken
// ---------------------------------------------------------------------------

/// A product scoped to the issuer (and issuer reference) that minted it.
///
/// This is the fungibility boundary: two goodies can be merged or netted
/// against each other only when their `IssuedToken`s are equal. Ordering is
/// issuer first, then product, which is the order the selector walks
/// groups in.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IssuedToken {
    pub issuer: PartyAndReference,
    pub product: Token,
}

impl IssuedToken {
    pub fn new(issuer: PartyAndReference, product: Token) -> Self {
        Self { issuer, product }
    }

    pub fn issuer_party(&self) -> &Party {
        &self.issuer.party
    }
}

impl fmt::Display for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} issued by {}", self.product, self.issuer)
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IssuedToken({}, {:?})", self.product, self.issuer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::OpaqueBytes;

    #[test]
    fn token_names_are_case_insensitive() {
        assert_eq!(Token::new("Nougat"), Token::new("NOUGAT"));
        assert_eq!(Token::new("nougat").to_string(), "NOUGAT");
        assert_ne!(Token::new("Nougat"), Token::new("Toffee"));
    }

    #[test]
    fn token_wire_form_is_a_type_object() {
        let json = serde_json::to_string(&Token::new("Nougat")).unwrap();
        assert_eq!(json, r#"{"type":"NOUGAT"}"#);

        let parsed: Token = serde_json::from_str(r#"{"type":"toffee"}"#).unwrap();
        assert_eq!(parsed, Token::new("TOFFEE"));
    }

    #[test]
    fn same_product_different_issuer_is_not_fungible() {
        let (x, _) = Party::generate("Issuer X");
        let (y, _) = Party::generate("Issuer Y");
        let r = OpaqueBytes::new(vec![7]).unwrap();
        let nougat = Token::new("Nougat");

        let from_x = nougat.issued_by(x.reference(r.clone()));
        let from_y = nougat.issued_by(y.reference(r.clone()));
        assert_ne!(from_x, from_y);
        assert_eq!(from_x, nougat.issued_by(x.reference(r)));
    }
}
