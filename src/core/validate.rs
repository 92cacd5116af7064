// =============================================================================
// VALIDATE — Vérification complète des invariants
// =============================================================================
//
// Ce module re-dérive tout depuis zéro et COLLECTE les problèmes au lieu de
// s'arrêter au premier :
//   - Un SchemaGraph est bien formé (extrémités présentes, équations
//     imposables sur les arêtes réellement présentes)
//   - Une InstantiatedDb respecte, phase par phase :
//       1. la structure du schéma
//       2. la soundness de chaque arête (images dans la cible)
//       3. la commutation de chaque équation
//
// Les phases sont ordonnées : une phase n'est évaluée que si les
// précédentes sont passées (composer des morphismes manquants n'a pas de
// sens). Les `validate()` des structures renvoient la première erreur.
//
// =============================================================================

use tracing::warn;

use super::error::CoreError;
use super::instance::InstantiatedDb;
use super::morphism::MorphismKind;
use super::schema::SchemaGraph;

/// Phase de validation d'une instanciation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Structure,
    Soundness,
    Equations,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Structure => write!(f, "structure"),
            Phase::Soundness => write!(f, "soundness"),
            Phase::Equations => write!(f, "equations"),
        }
    }
}

/// Erreur de validation : la phase en échec et le problème trouvé.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub phase: Phase,
    pub error: CoreError,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error ({}): {}", self.phase, self.error)
    }
}

impl std::error::Error for ValidationError {}

/// Tous les problèmes structurels d'un schéma, dans l'ordre de stockage.
pub(crate) fn schema_problems(graph: &SchemaGraph) -> Vec<CoreError> {
    let mut problems = Vec::new();

    for edge in graph.all_edges() {
        for endpoint in [&edge.source, &edge.target] {
            if !graph.has_vertex(endpoint) {
                problems.push(CoreError::UnknownVertex { name: endpoint.clone() });
            }
        }
    }

    for equation in graph.all_equations() {
        if let Some(defect) = graph.equation_defect(equation) {
            problems.push(CoreError::NotImposable {
                equation: equation.name().to_string(),
                defect,
            });
        }
    }

    problems
}

fn structure_problems(db: &InstantiatedDb) -> Vec<CoreError> {
    schema_problems(db.schema())
}

fn soundness_problems(db: &InstantiatedDb) -> Vec<CoreError> {
    let graph = db.schema();
    let mut problems: Vec<CoreError> = graph
        .vertices()
        .filter(|v| db.set(&v.name).is_none())
        .map(|v| CoreError::MissingSet { vertex: v.name.clone() })
        .collect();

    for kind in MorphismKind::ALL {
        for (id, _) in graph.edge_entries(kind) {
            if let Err(err) = db.check_edge_id(id) {
                problems.push(err);
            }
        }
    }

    problems
}

fn equation_problems(db: &InstantiatedDb) -> Vec<CoreError> {
    db.schema()
        .all_equations()
        .filter_map(|equation| db.check_equation(equation).err())
        .collect()
}

/// Vérifie qu'un SchemaGraph est bien formé, en rapportant tous les problèmes.
pub fn validate_schema(graph: &SchemaGraph) -> Result<(), Vec<ValidationError>> {
    let errors = tag(Phase::Structure, schema_problems(graph));
    if errors.is_empty() {
        Ok(())
    } else {
        warn!(graph = %graph.name, problems = errors.len(), "schema validation failed");
        Err(errors)
    }
}

/// Vérifie une instanciation phase par phase.
///
/// Renvoie tous les problèmes de la PREMIÈRE phase en échec.
pub fn validate_instance(db: &InstantiatedDb) -> Result<(), Vec<ValidationError>> {
    let phases: [(Phase, fn(&InstantiatedDb) -> Vec<CoreError>); 3] = [
        (Phase::Structure, structure_problems),
        (Phase::Soundness, soundness_problems),
        (Phase::Equations, equation_problems),
    ];
    for (phase, run) in phases {
        let errors = tag(phase, run(db));
        if !errors.is_empty() {
            warn!(db = %db.name, %phase, problems = errors.len(), "instance validation failed");
            return Err(errors);
        }
    }
    Ok(())
}

fn tag(phase: Phase, problems: Vec<CoreError>) -> Vec<ValidationError> {
    problems
        .into_iter()
        .map(|error| ValidationError { phase, error })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::morphism::{ElementSet, Function, PartialFunction};
    use crate::core::schema::Edge;

    fn company_schema() -> SchemaGraph {
        let mut s = SchemaGraph::new("Company");
        s.add_vertex("Employee").unwrap()
         .add_vertex("Department").unwrap();
        s.add_function_edge("manager", "Employee", "Employee").unwrap()
         .add_partial_edge("worksIn", "Employee", "Department").unwrap()
         .add_function_edge("secretary", "Department", "Employee").unwrap();
        s.add_partial_equation("loop", &["secretary", "worksIn"], &[]).unwrap();
        s
    }

    fn company_db() -> InstantiatedDb {
        let mut db = InstantiatedDb::new("company", company_schema()).unwrap();
        db.assign_set("Employee", ElementSet::from([1, 2])).unwrap()
          .assign_set("Department", ElementSet::from([10])).unwrap();
        db.assign_morphism("manager", Function::identity().into()).unwrap()
          .assign_morphism("worksIn", PartialFunction::from_pairs([(1, 10)]).into()).unwrap()
          .assign_morphism("secretary", Function::constant(1).into()).unwrap();
        db
    }

    #[test]
    fn test_validate_schema_ok() {
        assert!(validate_schema(&company_schema()).is_ok());
    }

    #[test]
    fn test_validate_schema_collects_every_problem() {
        let mut s = company_schema();
        s.insert_edge_unchecked(Edge::function("ghost", "Nowhere", "Elsewhere"));
        let errors = validate_schema(&s).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.phase == Phase::Structure));
        assert_eq!(errors[1].error, CoreError::UnknownVertex { name: "Elsewhere".into() });
    }

    #[test]
    fn test_validate_instance_ok() {
        assert!(validate_instance(&company_db()).is_ok());
    }

    #[test]
    fn test_soundness_reports_all_edges() {
        let mut db = company_db();
        db.assign_morphism("manager", Function::constant(9).into()).unwrap()
          .assign_morphism("secretary", Function::constant(8).into()).unwrap();
        let errors = validate_instance(&db).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.phase == Phase::Soundness));
        assert_eq!(errors[0].error.subject(), Some("manager"));
        assert_eq!(errors[1].error.subject(), Some("secretary"));
    }

    #[test]
    fn test_equations_phase_runs_last() {
        let mut db = company_db();
        db.assign_morphism("secretary", Function::constant(2).into()).unwrap();
        let errors = validate_instance(&db).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].phase, Phase::Equations);
        assert_eq!(
            errors[0].to_string(),
            "Validation error (equations): equation 'loop' fails at element 10"
        );
    }
}
