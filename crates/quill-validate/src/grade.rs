use quill_core::config::GradeTable;

/// Letter grade for the given counts: the first row whose limits both hold.
pub fn compute_grade(table: &GradeTable, issues: usize, warnings: usize) -> String {
    table
        .rules
        .iter()
        .find(|rule| {
            issues <= rule.max_issues && rule.max_warnings.map_or(true, |max| warnings <= max)
        })
        .map(|rule| rule.grade.clone())
        .unwrap_or_else(|| table.fallback.clone())
}
