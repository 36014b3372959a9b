const VECTOR_DIM_PLACEHOLDER: &str = "<VECTOR_DIM>";

pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace(VECTOR_DIM_PLACEHOLDER, &vector_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		match line.trim().strip_prefix("\\ir ").map(str::trim) {
			Some("tables/001_notes.sql") =>
				out.push_str(include_str!("../../../sql/tables/001_notes.sql")),
			Some("tables/002_ingest_jobs.sql") =>
				out.push_str(include_str!("../../../sql/tables/002_ingest_jobs.sql")),
			Some("tables/003_ingest_job_chunks.sql") =>
				out.push_str(include_str!("../../../sql/tables/003_ingest_job_chunks.sql")),
			_ => out.push_str(line),
		}

		out.push('\n');
	}

	out
}
