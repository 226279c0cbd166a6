// src/prompt.rs
use crate::models::dataset::TabularDataset;

/// Builds the system prompt for one turn, embedding every active dataset as
/// a JSON block the model is told to compute over.
///
/// The datasets are serialized verbatim: the model does the aggregation, so
/// the rows must reach it exactly as they were parsed.
pub fn build_system_prompt(datasets: &[TabularDataset]) -> String {
    let mut prompt = String::from(
        "You are a spreadsheet data analyst.\n\
         \n\
         CRITICAL RULE: compute using the real data in the JSON below. Never invent numbers.\n\
         \n\
         Required steps:\n\
         1. Read the JSON data provided below.\n\
         2. Identify which columns answer the question.\n\
         3. Group the values by the relevant column (e.g. by customer, product, region).\n\
         4. Sum the numeric values of each group.\n\
         5. Order from largest to smallest.\n\
         6. Show only the top 5 results.\n\
         \n\
         Response format: a short analysis summary (sheet name, rows processed,\n\
         grouping column, summed column), a markdown table with the top 5\n\
         results, a validation line with the overall total, and a one-sentence\n\
         final answer.\n\
         \n\
         Never show the raw JSON or individual spreadsheet rows in the answer;\n\
         use the data internally and present only the final results.\n",
    );

    if datasets.is_empty() {
        prompt.push_str(
            "\nNO SPREADSHEET IS LOADED.\n\
             Tell the user they need to upload a spreadsheet (CSV, XLS or XLSX) before any analysis can run.\n",
        );
        return prompt;
    }

    prompt.push_str("\nDATA AVAILABLE FOR ANALYSIS\n");
    for (index, dataset) in datasets.iter().enumerate() {
        prompt.push_str(&format!(
            "\nSHEET {}: \"{}\"\nColumns: {}\nTotal records: {}\n",
            index + 1,
            dataset.filename,
            dataset.columns.join(", "),
            dataset.rows.len()
        ));
        prompt.push_str("Data as JSON (process internally, do not show in the answer):\n```json\n");
        prompt.push_str(
            &serde_json::to_string_pretty(&dataset.rows).unwrap_or_else(|_| "[]".to_string()),
        );
        prompt.push_str("\n```\n");
    }

    prompt
}
