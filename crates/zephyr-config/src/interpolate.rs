//! `${{ ... }}` placeholder interpolation.
//!
//! Resolves placeholders against matrix values, step outputs, dependency
//! job outputs, environment variables and secrets. Generalises the
//! flatter `${var}` substitution used elsewhere in this family of tools
//! to the double-brace, dotted-path form pipelines actually write.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use zephyr_core::entities::MatrixScalar;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z0-9_-]+)*)\s*\}\}").unwrap()
});

/// Everything a placeholder can resolve against at dispatch time.
#[derive(Debug, Clone, Default)]
pub struct InterpolationContext {
    pub git_sha: Option<String>,
    pub git_branch: Option<String>,
    pub pipeline_name: Option<String>,
    pub run_id: Option<String>,
    /// Matrix dimension name -> this instance's value.
    pub matrix: HashMap<String, MatrixScalar>,
    /// step id -> output name -> value, for steps already run in this job.
    pub steps: HashMap<String, HashMap<String, String>>,
    /// job name -> output name -> value, for dependency jobs.
    pub needs: HashMap<String, HashMap<String, String>>,
    pub env: HashMap<String, String>,
    pub secrets: HashMap<String, String>,
}

impl InterpolationContext {
    pub fn resolve(&self, path: &str) -> Option<String> {
        let parts: Vec<&str> = path.split('.').collect();
        match parts.as_slice() {
            ["git", "sha"] => self.git_sha.clone(),
            ["git", "branch"] => self.git_branch.clone(),
            ["pipeline", "name"] => self.pipeline_name.clone(),
            ["run", "id"] => self.run_id.clone(),
            ["matrix", key] => self.matrix.get(*key).map(|v| v.to_string()),
            ["steps", id, "outputs", name] => {
                self.steps.get(*id).and_then(|outputs| outputs.get(*name)).cloned()
            }
            ["needs", job, "outputs", name] => {
                self.needs.get(*job).and_then(|outputs| outputs.get(*name)).cloned()
            }
            ["env", name] => self.env.get(*name).cloned(),
            ["secrets", name] => self.secrets.get(*name).cloned(),
            _ => None,
        }
    }

    /// Replace every `${{ path }}` placeholder in `input` with its
    /// resolved value; unresolvable placeholders are left verbatim.
    pub fn interpolate(&self, input: &str) -> String {
        PLACEHOLDER
            .replace_all(input, |caps: &regex::Captures| {
                let path = &caps[1];
                self.resolve(path).unwrap_or_else(|| caps[0].to_string())
            })
            .to_string()
    }

    pub fn interpolate_map(&self, map: &HashMap<String, String>) -> HashMap<String, String> {
        map.iter()
            .map(|(k, v)| (k.clone(), self.interpolate(v)))
            .collect()
    }

    /// The `MATRIX_<UPPER(key)>` environment variables derived from the
    /// current matrix binding.
    pub fn matrix_env(&self) -> HashMap<String, String> {
        self.matrix
            .iter()
            .map(|(k, v)| (format!("MATRIX_{}", k.to_uppercase()), v.to_string()))
            .collect()
    }
}

/// Build a `${{ secrets.<name> }}` placeholder.
pub fn secret(name: &str) -> String {
    format!("${{{{ secrets.{name} }}}}")
}

/// Build a `${{ steps.<step_id>.outputs.<name> }}` placeholder.
pub fn output(step_id: &str, name: &str) -> String {
    format!("${{{{ steps.{step_id}.outputs.{name} }}}}")
}

/// Build a `${{ matrix.<key> }}` placeholder.
pub fn matrix(key: &str) -> String {
    format!("${{{{ matrix.{key} }}}}")
}

/// Build a `${{ needs.<job>.outputs.<name> }}` placeholder.
pub fn needs(job: &str, name: &str) -> String {
    format!("${{{{ needs.{job}.outputs.{name} }}}}")
}

/// Replace every occurrence of any secret value of length >= 4 in `text`
/// with `***`. Idempotent: masking already-masked text is a no-op.
pub fn mask_secrets(text: &str, secrets: &[&str]) -> String {
    let mut masked = text.to_string();
    for secret in secrets {
        if secret.len() >= 4 {
            masked = masked.replace(secret, "***");
        }
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> InterpolationContext {
        let mut matrix = HashMap::new();
        matrix.insert("os".to_string(), MatrixScalar::String("ubuntu".to_string()));
        let mut build_outputs = HashMap::new();
        build_outputs.insert("version".to_string(), "1.2.3".to_string());
        let mut steps = HashMap::new();
        steps.insert("build".to_string(), build_outputs);
        InterpolationContext {
            git_sha: Some("abc123".to_string()),
            matrix,
            steps,
            ..Default::default()
        }
    }

    #[test]
    fn resolves_step_output() {
        let ctx = ctx();
        assert_eq!(
            ctx.interpolate("VER=${{ steps.build.outputs.version }}"),
            "VER=1.2.3"
        );
    }

    #[test]
    fn resolves_matrix_value() {
        let ctx = ctx();
        assert_eq!(ctx.interpolate("os is ${{ matrix.os }}"), "os is ubuntu");
    }

    #[test]
    fn unresolved_placeholder_is_preserved() {
        let ctx = InterpolationContext::default();
        assert_eq!(ctx.interpolate("${{ bogus.thing }}"), "${{ bogus.thing }}");
    }

    #[test]
    fn matrix_env_uppercases_key() {
        let ctx = ctx();
        let env = ctx.matrix_env();
        assert_eq!(env.get("MATRIX_OS"), Some(&"ubuntu".to_string()));
    }

    #[test]
    fn helper_placeholders_round_trip() {
        let mut dep_outputs = HashMap::new();
        dep_outputs.insert("built".to_string(), "true".to_string());
        let mut dep_needs = HashMap::new();
        dep_needs.insert("build".to_string(), dep_outputs);
        let ctx = InterpolationContext {
            needs: dep_needs,
            ..Default::default()
        };
        assert_eq!(ctx.interpolate(&needs("build", "built")), "true");
        assert_eq!(ctx.interpolate(&matrix("os")), "${{ matrix.os }}");
    }

    #[test]
    fn mask_secrets_is_idempotent() {
        let text = "token=sk-abcdef";
        let once = mask_secrets(text, &["sk-abcdef"]);
        let twice = mask_secrets(&once, &["sk-abcdef"]);
        assert_eq!(once, twice);
        assert_eq!(once, "token=***");
    }

    #[test]
    fn short_secrets_are_never_masked() {
        let text = "code=ab";
        assert_eq!(mask_secrets(text, &["ab"]), "code=ab");
    }
}
