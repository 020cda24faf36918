//! Matrix expansion: one job definition -> one or more concrete job
//! instances, via the Cartesian product of its matrix dimensions.

use std::collections::HashMap;

use zephyr_config::model::{JobDef, MatrixDef};
use zephyr_core::entities::MatrixScalar;

/// One point in a matrix's Cartesian product, attached to the expanded
/// job instance it produced.
#[derive(Debug, Clone)]
pub struct MatrixCombination {
    pub index: usize,
    pub values: HashMap<String, MatrixScalar>,
    /// Comma-joined `key=value` list in declaration order, e.g.
    /// `"os=ubuntu, node=18"`.
    pub name_suffix: String,
}

/// A job definition after matrix expansion: one concrete schedulable
/// unit, still logically the same job.
#[derive(Debug, Clone)]
pub struct ExpandedJob {
    pub job_name: String,
    pub instance_id: String,
    pub display_name: String,
    pub def: JobDef,
    pub matrix: Option<MatrixCombination>,
}

/// Expand a job definition into its matrix instances. A job with no
/// matrix expands to exactly one instance carrying no combination.
pub fn expand_matrix(job: &JobDef) -> Vec<ExpandedJob> {
    let Some(matrix) = &job.matrix else {
        return vec![ExpandedJob {
            job_name: job.name.clone(),
            instance_id: job.name.clone(),
            display_name: job.name.clone(),
            def: job.clone(),
            matrix: None,
        }];
    };

    let base = cartesian_product(&matrix.values);
    let mut combos: Vec<Vec<(String, MatrixScalar)>> = base
        .into_iter()
        .filter(|combo| !matches_any_exclusion(combo, &matrix.exclude))
        .collect();

    for inclusion in &matrix.include {
        if !combos
            .iter()
            .any(|combo| matches_on_specified_keys(combo, inclusion))
        {
            combos.push(synthesize_inclusion(matrix, inclusion));
        }
    }

    combos
        .into_iter()
        .enumerate()
        .map(|(index, combo)| build_expanded_job(job, index, combo))
        .collect()
}

fn cartesian_product(dims: &[(String, Vec<MatrixScalar>)]) -> Vec<Vec<(String, MatrixScalar)>> {
    let mut product: Vec<Vec<(String, MatrixScalar)>> = vec![Vec::new()];
    for (key, values) in dims {
        let mut next = Vec::with_capacity(product.len() * values.len());
        for prefix in &product {
            for value in values {
                let mut combo = prefix.clone();
                combo.push((key.clone(), value.clone()));
                next.push(combo);
            }
        }
        product = next;
    }
    product
}

fn matches_any_exclusion(
    combo: &[(String, MatrixScalar)],
    exclusions: &[Vec<(String, MatrixScalar)>],
) -> bool {
    exclusions
        .iter()
        .any(|exclusion| matches_on_specified_keys(combo, exclusion))
}

fn matches_on_specified_keys(
    combo: &[(String, MatrixScalar)],
    pattern: &[(String, MatrixScalar)],
) -> bool {
    pattern.iter().all(|(key, value)| {
        combo
            .iter()
            .any(|(ck, cv)| ck == key && cv == value)
    })
}

fn synthesize_inclusion(
    matrix: &MatrixDef,
    inclusion: &[(String, MatrixScalar)],
) -> Vec<(String, MatrixScalar)> {
    matrix
        .values
        .iter()
        .map(|(key, values)| {
            let value = inclusion
                .iter()
                .find(|(ik, _)| ik == key)
                .map(|(_, v)| v.clone())
                .or_else(|| values.first().cloned())
                .expect("matrix dimension has at least one value");
            (key.clone(), value)
        })
        .collect()
}

fn build_expanded_job(job: &JobDef, index: usize, combo: Vec<(String, MatrixScalar)>) -> ExpandedJob {
    let name_suffix = combo
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    let instance_id = format!("{}-{}", job.name, name_suffix);
    let display_name = format!("{} ({})", job.name, name_suffix);
    let values = combo.into_iter().collect();

    ExpandedJob {
        job_name: job.name.clone(),
        instance_id,
        display_name,
        def: job.clone(),
        matrix: Some(MatrixCombination {
            index,
            values,
            name_suffix,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zephyr_config::model::MatrixDef;

    fn string_values(values: &[&str]) -> Vec<MatrixScalar> {
        values
            .iter()
            .map(|v| MatrixScalar::String(v.to_string()))
            .collect()
    }

    #[test]
    fn no_matrix_yields_single_instance() {
        let job = JobDef::new("build", "alpine:latest");
        let expanded = expand_matrix(&job);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].instance_id, "build");
        assert!(expanded[0].matrix.is_none());
    }

    #[test]
    fn exclusion_removes_one_combination() {
        let mut job = JobDef::new("test", "alpine:latest");
        job.matrix = Some(MatrixDef {
            values: vec![
                ("os".to_string(), string_values(&["ubuntu", "alpine"])),
                ("node".to_string(), string_values(&["18", "20"])),
            ],
            exclude: vec![vec![
                ("os".to_string(), MatrixScalar::String("alpine".to_string())),
                ("node".to_string(), MatrixScalar::String("18".to_string())),
            ]],
            include: vec![],
            max_parallel: None,
        });

        let expanded = expand_matrix(&job);
        let display_names: Vec<_> = expanded.iter().map(|e| e.display_name.clone()).collect();
        assert_eq!(
            display_names,
            vec![
                "test (os=ubuntu, node=18)",
                "test (os=ubuntu, node=20)",
                "test (os=alpine, node=20)",
            ]
        );
    }

    #[test]
    fn inclusion_appends_new_combination() {
        let mut job = JobDef::new("test", "alpine:latest");
        job.matrix = Some(MatrixDef {
            values: vec![("os".to_string(), string_values(&["ubuntu"]))],
            exclude: vec![],
            include: vec![vec![
                ("os".to_string(), MatrixScalar::String("windows".to_string())),
            ]],
            max_parallel: None,
        });

        let expanded = expand_matrix(&job);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[1].display_name, "test (os=windows)");
    }

    #[test]
    fn full_product_with_no_exclusions_or_inclusions() {
        let mut job = JobDef::new("build", "alpine:latest");
        job.matrix = Some(MatrixDef {
            values: vec![
                ("os".to_string(), string_values(&["a", "b"])),
                ("arch".to_string(), string_values(&["x86", "arm"])),
            ],
            exclude: vec![],
            include: vec![],
            max_parallel: None,
        });

        assert_eq!(expand_matrix(&job).len(), 4);
    }
}
