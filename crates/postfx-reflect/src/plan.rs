use postfx_core::{ChainError, ReflectError};

use crate::reflection::ShaderReflection;
use crate::semantics::TextureSemantic;

/// Dependency summary of a reflected chain.
///
/// Passes execute in index order; `analyze` rejects reads of a pass output that is
/// not yet rendered and derives the resources the chain has to allocate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPlan {
    /// Frames kept in the history ring, including the current one.
    pub history_depth: usize,
    /// Passes whose previous output is sampled by someone, ascending.
    pub feedback: Vec<usize>,
}

impl ChainPlan {
    pub fn analyze(reflections: &[ShaderReflection]) -> Result<ChainPlan, ChainError> {
        if reflections.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        let last = reflections.len() - 1;

        let mut history_depth = 1;
        let mut feedback = Vec::new();

        for (pass, reflection) in reflections.iter().enumerate() {
            for texture in reflection.texture_refs() {
                match texture.semantic {
                    TextureSemantic::OriginalHistory => {
                        history_depth = history_depth.max(texture.index + 1);
                    }
                    TextureSemantic::PassOutput => {
                        if texture.index >= pass {
                            return Err(ReflectError::ForwardReference {
                                pass,
                                referenced: texture.index,
                            }
                            .into());
                        }
                    }
                    TextureSemantic::PassFeedback => {
                        if texture.index > last {
                            return Err(ReflectError::FeedbackOutOfRange {
                                pass,
                                referenced: texture.index,
                            }
                            .into());
                        }
                        if texture.index == last {
                            return Err(ChainError::FeedbackOnFinalPass { index: last });
                        }
                        if !feedback.contains(&texture.index) {
                            feedback.push(texture.index);
                        }
                    }
                    _ => {}
                }
            }
        }
        feedback.sort_unstable();

        Ok(ChainPlan {
            history_depth,
            feedback,
        })
    }

    pub fn needs_feedback(&self, pass: usize) -> bool {
        self.feedback.binary_search(&pass).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::SamplerBinding;
    use crate::semantics::TextureRef;

    fn sampling(textures: &[(TextureSemantic, usize)]) -> ShaderReflection {
        ShaderReflection {
            textures: textures
                .iter()
                .enumerate()
                .map(|(b, (s, i))| SamplerBinding {
                    texture: TextureRef::new(*s, *i),
                    binding: b as u32 + 1,
                })
                .collect(),
            ..ShaderReflection::default()
        }
    }

    #[test]
    fn history_depth_is_one_plus_max_index() {
        let plan = ChainPlan::analyze(&[
            sampling(&[(TextureSemantic::OriginalHistory, 2)]),
            sampling(&[(TextureSemantic::OriginalHistory, 5)]),
        ])
        .expect("plan");
        assert_eq!(plan.history_depth, 6);

        let plan = ChainPlan::analyze(&[sampling(&[(TextureSemantic::Source, 0)])]).expect("plan");
        assert_eq!(plan.history_depth, 1);
    }

    #[test]
    fn records_feedback_sources() {
        let plan = ChainPlan::analyze(&[
            sampling(&[(TextureSemantic::PassFeedback, 1)]),
            sampling(&[(TextureSemantic::PassOutput, 0), (TextureSemantic::PassFeedback, 0)]),
            sampling(&[(TextureSemantic::PassOutput, 0), (TextureSemantic::PassOutput, 1)]),
        ])
        .expect("plan");
        assert_eq!(plan.feedback, vec![0, 1]);
        assert!(plan.needs_feedback(1));
        assert!(!plan.needs_feedback(2));
    }

    #[test]
    fn feedback_on_the_final_pass_is_rejected() {
        let err = ChainPlan::analyze(&[
            sampling(&[(TextureSemantic::PassFeedback, 1)]),
            sampling(&[]),
        ])
        .expect_err("must reject");
        assert!(matches!(err, ChainError::FeedbackOnFinalPass { index: 1 }));
    }

    #[test]
    fn empty_chains_are_rejected() {
        assert!(matches!(ChainPlan::analyze(&[]), Err(ChainError::EmptyChain)));
    }
}
