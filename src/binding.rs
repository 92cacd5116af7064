// =============================================================================
// BINDING — Spécialisation de morphismes paramétrés
// =============================================================================
//
// Un ParameterizedMorphism est un GABARIT : une famille de morphismes
// indexée par des arguments typés.
//
// EXEMPLE :
//   shift(k: Int) = x ↦ x + k
//   shift.specialize([Int(3)])  → la fonction x ↦ x + 3
//   shift.specialize([Bool(true)]) → ParameterMismatch à la position 0
//
// Les types d'arguments forment une somme fermée (ArgumentKind) : la
// vérification se fait à la liaison, par comparaison de variantes, avant
// toute construction du morphisme.
//
// Ce module est au-dessus du cœur : il ne consomme que les types de
// l'algèbre de morphismes.
//
// =============================================================================

use std::sync::Arc;

use tracing::debug;

use crate::core::error::CoreError;
use crate::core::morphism::{ElementId, Function, Morphism, MorphismKind, PartialFunction, Relation};

/// Sorte d'un argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentKind {
    Int,
    Float,
    Text,
    Bool,
    Element,
}

impl std::fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgumentKind::Int => write!(f, "Int"),
            ArgumentKind::Float => write!(f, "Float"),
            ArgumentKind::Text => write!(f, "Text"),
            ArgumentKind::Bool => write!(f, "Bool"),
            ArgumentKind::Element => write!(f, "Element"),
        }
    }
}

/// Un argument effectif.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Element(ElementId),
}

impl Argument {
    pub fn kind(&self) -> ArgumentKind {
        match self {
            Argument::Int(_) => ArgumentKind::Int,
            Argument::Float(_) => ArgumentKind::Float,
            Argument::Text(_) => ArgumentKind::Text,
            Argument::Bool(_) => ArgumentKind::Bool,
            Argument::Element(_) => ArgumentKind::Element,
        }
    }
}

/// Les arguments déjà vérifiés, lus par position.
#[derive(Debug, Clone)]
pub struct Bindings {
    args: Vec<Argument>,
}

impl Bindings {
    fn get(&self, position: usize, expected: ArgumentKind) -> Result<&Argument, CoreError> {
        match self.args.get(position) {
            Some(arg) if arg.kind() == expected => Ok(arg),
            Some(arg) => Err(mismatch(position, expected, arg.kind())),
            None => Err(CoreError::ParameterMismatch {
                position,
                expected: expected.to_string(),
                found: "nothing".to_string(),
            }),
        }
    }

    pub fn int(&self, position: usize) -> Result<i64, CoreError> {
        match self.get(position, ArgumentKind::Int)? {
            Argument::Int(v) => Ok(*v),
            other => Err(mismatch(position, ArgumentKind::Int, other.kind())),
        }
    }

    pub fn float(&self, position: usize) -> Result<f64, CoreError> {
        match self.get(position, ArgumentKind::Float)? {
            Argument::Float(v) => Ok(*v),
            other => Err(mismatch(position, ArgumentKind::Float, other.kind())),
        }
    }

    pub fn text(&self, position: usize) -> Result<&str, CoreError> {
        match self.get(position, ArgumentKind::Text)? {
            Argument::Text(v) => Ok(v),
            other => Err(mismatch(position, ArgumentKind::Text, other.kind())),
        }
    }

    pub fn boolean(&self, position: usize) -> Result<bool, CoreError> {
        match self.get(position, ArgumentKind::Bool)? {
            Argument::Bool(v) => Ok(*v),
            other => Err(mismatch(position, ArgumentKind::Bool, other.kind())),
        }
    }

    pub fn element(&self, position: usize) -> Result<ElementId, CoreError> {
        match self.get(position, ArgumentKind::Element)? {
            Argument::Element(v) => Ok(*v),
            other => Err(mismatch(position, ArgumentKind::Element, other.kind())),
        }
    }
}

fn mismatch(position: usize, expected: ArgumentKind, found: ArgumentKind) -> CoreError {
    CoreError::ParameterMismatch {
        position,
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

type Builder = Arc<dyn Fn(&Bindings) -> Result<Morphism, CoreError> + Send + Sync>;

/// Gabarit de morphisme : une sorte, des paramètres déclarés, un constructeur.
#[derive(Clone)]
pub struct ParameterizedMorphism {
    pub name: String,
    kind: MorphismKind,
    parameters: Vec<ArgumentKind>,
    build: Builder,
}

impl std::fmt::Debug for ParameterizedMorphism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterizedMorphism")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl ParameterizedMorphism {
    pub fn new<F>(name: &str, kind: MorphismKind, parameters: Vec<ArgumentKind>, build: F) -> Self
    where
        F: Fn(&Bindings) -> Result<Morphism, CoreError> + Send + Sync + 'static,
    {
        ParameterizedMorphism {
            name: name.to_string(),
            kind,
            parameters,
            build: Arc::new(build),
        }
    }

    pub fn function<F>(name: &str, parameters: Vec<ArgumentKind>, build: F) -> Self
    where
        F: Fn(&Bindings) -> Result<Function, CoreError> + Send + Sync + 'static,
    {
        Self::new(name, MorphismKind::Function, parameters, move |b| build(b).map(Morphism::from))
    }

    pub fn partial<F>(name: &str, parameters: Vec<ArgumentKind>, build: F) -> Self
    where
        F: Fn(&Bindings) -> Result<PartialFunction, CoreError> + Send + Sync + 'static,
    {
        Self::new(name, MorphismKind::PartialFunction, parameters, move |b| {
            build(b).map(Morphism::from)
        })
    }

    pub fn relation<F>(name: &str, parameters: Vec<ArgumentKind>, build: F) -> Self
    where
        F: Fn(&Bindings) -> Result<Relation, CoreError> + Send + Sync + 'static,
    {
        Self::new(name, MorphismKind::Relation, parameters, move |b| build(b).map(Morphism::from))
    }

    pub fn kind(&self) -> MorphismKind {
        self.kind
    }

    pub fn parameters(&self) -> &[ArgumentKind] {
        &self.parameters
    }

    /// Lie les arguments et construit le morphisme spécialisé.
    ///
    /// Échoue si le nombre d'arguments diffère, ou si un argument n'a pas
    /// la sorte déclarée à sa position.
    pub fn specialize(&self, args: Vec<Argument>) -> Result<Morphism, CoreError> {
        if args.len() != self.parameters.len() {
            return Err(CoreError::ParameterMismatch {
                position: args.len().min(self.parameters.len()),
                expected: format!("{} arguments", self.parameters.len()),
                found: format!("{} arguments", args.len()),
            });
        }
        for (position, (declared, arg)) in self.parameters.iter().zip(&args).enumerate() {
            if arg.kind() != *declared {
                return Err(mismatch(position, *declared, arg.kind()));
            }
        }
        let morphism = (self.build)(&Bindings { args })?;
        if morphism.kind() != self.kind {
            return Err(CoreError::KindMismatch {
                name: self.name.clone(),
                expected: self.kind,
                found: morphism.kind(),
            });
        }
        debug!(template = %self.name, kind = %self.kind, "morphism specialized");
        Ok(morphism)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::morphism::ElementSet;

    fn shift() -> ParameterizedMorphism {
        ParameterizedMorphism::function("shift", vec![ArgumentKind::Int], |b| {
            let k = b.int(0)?;
            Ok(Function::new(move |x| x.wrapping_add_signed(k)))
        })
    }

    /// Partielle définie sur [lo, hi], identité sur cet intervalle.
    fn window() -> ParameterizedMorphism {
        ParameterizedMorphism::partial(
            "window",
            vec![ArgumentKind::Element, ArgumentKind::Element],
            |b| {
                let (lo, hi) = (b.element(0)?, b.element(1)?);
                Ok(PartialFunction::new((lo..=hi).collect(), |x| x))
            },
        )
    }

    #[test]
    fn test_specialize_function() {
        let f = shift().specialize(vec![Argument::Int(3)]).unwrap();
        assert_eq!(f.to_function().unwrap().apply(4), 7);
    }

    #[test]
    fn test_specialize_partial() {
        let w = window()
            .specialize(vec![Argument::Element(2), Argument::Element(4)])
            .unwrap();
        let w = w.to_partial(&ElementSet::new()).unwrap();
        assert_eq!(w.apply(3), Some(3));
        assert_eq!(w.apply(5), None);
    }

    #[test]
    fn test_wrong_argument_count() {
        let err = window().specialize(vec![Argument::Element(2)]).unwrap_err();
        assert_eq!(
            err,
            CoreError::ParameterMismatch {
                position: 1,
                expected: "2 arguments".into(),
                found: "1 arguments".into(),
            }
        );
    }

    #[test]
    fn test_wrong_argument_kind() {
        let err = window()
            .specialize(vec![Argument::Element(2), Argument::Text("4".into())])
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::ParameterMismatch {
                position: 1,
                expected: "Element".into(),
                found: "Text".into(),
            }
        );
        assert!(matches!(
            shift().specialize(vec![Argument::Float(1.5)]),
            Err(CoreError::ParameterMismatch { position: 0, .. })
        ));
    }

    #[test]
    fn test_builder_kind_is_enforced() {
        let liar = ParameterizedMorphism::new("liar", MorphismKind::Function, vec![], |_| {
            Ok(Relation::from_pairs([(1, 2)]).into())
        });
        assert!(matches!(
            liar.specialize(vec![]),
            Err(CoreError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_relation_template() {
        let fan = ParameterizedMorphism::relation("fan", vec![ArgumentKind::Bool], |b| {
            let wide = b.boolean(0)?;
            Ok(Relation::new(move |x| {
                if wide {
                    ElementSet::from([x, x + 1])
                } else {
                    ElementSet::from([x])
                }
            }))
        });
        let r = fan.specialize(vec![Argument::Bool(true)]).unwrap();
        assert_eq!(r.kind(), MorphismKind::Relation);
        assert_eq!(r.to_relation(&ElementSet::new()).apply(1), ElementSet::from([1, 2]));
        assert_eq!(fan.parameters(), &[ArgumentKind::Bool]);
    }

    #[test]
    fn test_float_and_text_arguments() {
        let scale = ParameterizedMorphism::function(
            "scale",
            vec![ArgumentKind::Float, ArgumentKind::Text],
            |b| {
                let factor = b.float(0)?;
                let mode = b.text(1)?;
                let up = mode == "ceil";
                Ok(Function::new(move |x| {
                    let y = x as f64 * factor;
                    (if up { y.ceil() } else { y.floor() }) as ElementId
                }))
            },
        );
        let f = scale
            .specialize(vec![Argument::Float(1.5), Argument::Text("ceil".into())])
            .unwrap();
        assert_eq!(f.to_function().unwrap().apply(3), 5);
        let f = scale
            .specialize(vec![Argument::Float(1.5), Argument::Text("floor".into())])
            .unwrap();
        assert_eq!(f.to_function().unwrap().apply(3), 4);
    }
}
