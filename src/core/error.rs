// =============================================================================
// ERROR — Taxonomie des échecs du cœur
// =============================================================================
//
// Chaque échec est un résultat nommé et prévisible : une entrée bien formée
// mais sémantiquement invalide. Il n'existe pas d'erreur interne fatale.
//
// Les mutateurs sont transactionnels : quand ils renvoient une erreur,
// la structure est exactement dans l'état d'avant l'appel.
//
// =============================================================================

use thiserror::Error;

use super::morphism::{ElementId, MorphismKind};

/// Côté d'une équation de chemins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Lhs,
    Rhs,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Lhs => write!(f, "lhs"),
            Side::Rhs => write!(f, "rhs"),
        }
    }
}

/// Raison pour laquelle une équation ne peut pas être imposée.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathDefect {
    /// Deux arêtes consécutives ne se composent pas : la cible de l'arête
    /// `position - 1` n'est pas la source de l'arête `position`.
    #[error("{side} path is not composable at position {position}")]
    Broken { side: Side, position: usize },

    #[error("lhs and rhs do not start at the same vertex")]
    SourceMismatch,

    #[error("lhs and rhs do not end at the same vertex")]
    TargetMismatch,

    /// L'autre côté est vide (identité) mais ce chemin ne revient pas
    /// à son point de départ.
    #[error("{side} path must be a loop when the other side is empty")]
    NotALoop { side: Side },

    #[error("edge '{edge}' is a {kind} edge, too general for this equation")]
    TooGeneral { edge: String, kind: MorphismKind },

    #[error("edge '{edge}' is not present in the graph")]
    MissingEdge { edge: String },
}

/// Erreurs produites par le cœur (graphe, algèbre, instanciation).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("duplicate vertex: '{name}'")]
    DuplicateVertex { name: String },

    #[error("unknown vertex: '{name}'")]
    UnknownVertex { name: String },

    #[error("unknown edge: '{name}'")]
    UnknownEdge { name: String },

    #[error("unknown equation: '{name}'")]
    UnknownEquation { name: String },

    #[error("equation '{equation}' is not imposable: {defect}")]
    NotImposable { equation: String, defect: PathDefect },

    /// Le nombre de morphismes et le nombre de domaines d'un chemin diffèrent.
    #[error("arity mismatch: {morphisms} morphisms for {domains} domains")]
    ArityMismatch { morphisms: usize, domains: usize },

    #[error("cannot compose an empty path")]
    EmptyPath,

    #[error("'{name}' expects a {expected} morphism, got a {found}")]
    KindMismatch {
        name: String,
        expected: MorphismKind,
        found: MorphismKind,
    },

    #[error("no set assigned to vertex '{vertex}'")]
    MissingSet { vertex: String },

    #[error("no morphism assigned to edge '{edge}'")]
    MissingMorphism { edge: String },

    #[error("edge '{edge}' maps {element} to {image}, outside its target set")]
    DomainViolation {
        edge: String,
        element: ElementId,
        image: ElementId,
    },

    #[error("equation '{equation}' fails at element {element}")]
    EquationViolation { equation: String, element: ElementId },

    #[error("parameter mismatch at position {position}: expected {expected}, found {found}")]
    ParameterMismatch {
        position: usize,
        expected: String,
        found: String,
    },
}

impl CoreError {
    /// Nom de l'élément (sommet, arête, équation) mis en cause, s'il y en a un.
    pub fn subject(&self) -> Option<&str> {
        match self {
            CoreError::DuplicateVertex { name }
            | CoreError::UnknownVertex { name }
            | CoreError::UnknownEdge { name }
            | CoreError::UnknownEquation { name }
            | CoreError::KindMismatch { name, .. } => Some(name),
            CoreError::NotImposable { equation, .. }
            | CoreError::EquationViolation { equation, .. } => Some(equation),
            CoreError::MissingSet { vertex } => Some(vertex),
            CoreError::MissingMorphism { edge } | CoreError::DomainViolation { edge, .. } => {
                Some(edge)
            }
            CoreError::ArityMismatch { .. }
            | CoreError::EmptyPath
            | CoreError::ParameterMismatch { .. } => None,
        }
    }
}
