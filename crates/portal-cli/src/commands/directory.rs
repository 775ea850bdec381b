//! Public directory view

use anyhow::Result;

use portal_core::directory::{self, DirectoryFilter};
use portal_core::Portal;

use crate::output::{Output, OutputFormat};

/// Show the public page: teacher, featured students, filtered results,
/// sections and quick links
pub fn show(
    portal: &Portal,
    search: Option<String>,
    class: Option<String>,
    year: Option<String>,
    output: &Output,
) -> Result<()> {
    let filter = DirectoryFilter {
        search: search.unwrap_or_default(),
        class,
        year,
    };
    let students = portal.students();
    let results = filter.apply(students);
    let is_admin = portal.is_admin();

    match output.format {
        OutputFormat::Json => {
            let featured: Vec<_> = directory::featured(students)
                .into_iter()
                .map(|s| s.id.as_str())
                .collect();
            let results: Vec<_> = results.iter().map(|s| s.id.as_str()).collect();
            println!(
                "{}",
                serde_json::json!({
                    "teacher": portal.teacher(),
                    "featured": featured,
                    "results": results,
                    "classes": directory::class_options(students),
                    "years": directory::year_options(students),
                    "sections": directory::visible_sections(portal.sections()),
                    "links": portal.links(),
                })
            );
        }
        OutputFormat::Quiet => {
            for student in results {
                println!("{}", student.id);
            }
        }
        OutputFormat::Human => {
            output.print_teacher(portal.teacher());

            println!();
            println!("── Featured ──");
            output.print_students(&directory::featured(students), is_admin);

            println!();
            println!("── Results ──");
            println!(
                "Classes: {}   Years: {}",
                directory::class_options(students).join(", "),
                directory::year_options(students).join(", ")
            );
            output.print_students(&results, is_admin);

            let sections = directory::visible_sections(portal.sections());
            if !sections.is_empty() {
                println!();
                output.print_sections(&sections);
            }

            println!();
            println!("── Quick Links ──");
            output.print_links(portal.links());
        }
    }

    Ok(())
}
