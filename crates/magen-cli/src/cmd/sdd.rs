use crate::output::{print_json, print_table};
use crate::root::Project;
use anyhow::Context;
use clap::Subcommand;
use magen_core::sdd::{next_feature_id, Document, Feature};

#[derive(Subcommand)]
pub enum SddSubcommand {
    /// Show which document a feature is on
    State { feature: String },
    /// Mark a document finalized and move to the next one
    Finalize {
        feature: String,
        /// prd, tdd or tasks
        document: String,
    },
    /// Print the next free feature id for a name
    NextId { name: String },
}

pub fn run(project: &Project, subcmd: SddSubcommand, json: bool) -> anyhow::Result<()> {
    let sdd_dir = project.config.sdd_directory.as_str();
    match subcmd {
        SddSubcommand::State { feature } => {
            let feature = Feature::open(&project.root, sdd_dir, &feature)?;
            state(&feature, json)
        }
        SddSubcommand::Finalize { feature, document } => {
            let document: Document = document.parse()?;
            let feature = Feature::open(&project.root, sdd_dir, &feature)?;
            finalize(&feature, document, json)
        }
        SddSubcommand::NextId { name } => {
            let id = next_feature_id(&project.root, sdd_dir, &name)
                .with_context(|| format!("failed to derive a feature id from '{name}'"))?;
            if json {
                print_json(&serde_json::json!({ "featureId": id }))
            } else {
                println!("{id}");
                Ok(())
            }
        }
    }
}

fn state(feature: &Feature, json: bool) -> anyhow::Result<()> {
    let current = feature
        .state()
        .with_context(|| format!("failed to read documents for {}", feature.id))?;
    let documents = feature.documents()?;

    if json {
        return print_json(&serde_json::json!({
            "featureId": feature.id,
            "currentState": current,
            "documents": documents,
        }));
    }

    println!("Feature: {}", feature.id);
    println!("State:   {current}\n");
    let rows = documents
        .iter()
        .map(|d| {
            vec![
                d.document.label().to_string(),
                d.status.to_string(),
                d.path.display().to_string(),
            ]
        })
        .collect();
    print_table(&["DOCUMENT", "STATUS", "PATH"], rows);
    Ok(())
}

fn finalize(feature: &Feature, document: Document, json: bool) -> anyhow::Result<()> {
    let report = feature
        .finalize(document)
        .with_context(|| format!("failed to finalize {} for {}", document.label(), feature.id))?;

    if json {
        return print_json(&report);
    }
    if report.changed {
        println!("{} finalized.", document.label());
    } else {
        println!("{} was already finalized.", document.label());
    }
    if let Some(path) = &report.placeholder {
        println!("Created placeholder {}", path.display());
    }
    println!("State: {}", report.state);
    Ok(())
}
