// =============================================================================
// CORE — Module principal du cœur catégorique
// =============================================================================
//
// Ce module regroupe toute la logique mathématique pure :
// pas d'I/O, pas de sérialisation, pas de point d'entrée. Uniquement des
// graphes typés, des morphismes sur des ensembles finis et leurs équations.
//
// Architecture :
//   error     → la taxonomie des échecs (tous nommés, tous récupérables)
//   morphism  → l'algèbre : fonctions, fonctions partielles, relations
//   schema    → le graphe typé (sommets + arêtes + équations de chemins)
//   instance  → une instanciation concrète du graphe (ensembles + morphismes)
//   validate  → la vérification complète, phase par phase
//
// =============================================================================

pub mod error;
pub mod morphism;
pub mod schema;
pub mod instance;
pub mod validate;
