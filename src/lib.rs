// =============================================================================
// RELGRAPH — Schéma-graphe catégorique typé et ses instanciations
// =============================================================================
//
// relgraph décrit des données comme une catégorie présentée par un graphe :
// des sommets (types d'objets), des arêtes typées (fonctions, fonctions
// partielles, relations) et des équations de chemins. Une instanciation
// donne un ensemble fini à chaque sommet et un morphisme concret à chaque
// arête ; elle est valide si elle respecte cibles et équations.
//
// Architecture :
//   core/     → Le cœur pur (graphe, algèbre, instanciation, validation)
//   binding   → Spécialisation de morphismes paramétrés, au-dessus du cœur
//
// La bibliothèque journalise via `tracing` et n'installe aucun subscriber :
// c'est à l'hôte de le faire.
//
// =============================================================================

pub mod core;
pub mod binding;

pub use crate::core::error::{CoreError, PathDefect, Side};
pub use crate::core::instance::InstantiatedDb;
pub use crate::core::morphism::{
    ElementId, ElementSet, Function, Morphism, MorphismKind, PartialFunction, Relation,
};
pub use crate::core::schema::{Edge, Equation, Path, RemovalReport, SchemaGraph, Vertex};
pub use crate::core::validate::{validate_instance, validate_schema, Phase, ValidationError};
