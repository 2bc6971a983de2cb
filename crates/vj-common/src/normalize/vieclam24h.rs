//! Mapping for vieclam24h records, which arrive enriched with JSON-LD
//! fields extracted by the detail scraper. JSON-LD values win over the
//! listing API's where both exist.

use serde_json::{Map, Value};

use crate::domain::Job;
use crate::normalize::{
    experience, get_bool, get_f64, get_i64, get_str, get_str_array, parse_epoch, salary,
};

pub fn apply(job: &mut Job, data: &Map<String, Value>) {
    job.title = get_str(data, &["jobTitle", "title"]);
    job.company = get_str(data, &["companyName", "company"]);
    job.location = get_str(data, &["contactAddress", "address"]);

    job.location_city = get_str_array(data, "locationCity");
    job.location_district = get_str_array(data, "locationDistrict");

    job.position = get_str(data, &["occupationalCategory"]);
    job.work_type = get_str(data, &["employmentType"]);

    let req = get_str(data, &["jobRequirement"]);
    let other = get_str(data, &["otherRequirement"]);
    job.requirements = if !req.is_empty() && !other.is_empty() {
        format!("{req}<br/>{other}")
    } else {
        format!("{req}{other}")
    };

    job.description = get_str(data, &["jobDescription"]);

    job.salary_min = get_i64(data, &["salaryMinJsonLd", "salaryFrom", "salaryMin"]);
    job.salary_max = get_i64(data, &["salaryMaxJsonLd", "salaryTo", "salaryMax"]);

    if get_bool(data, "isNegotiable") {
        job.is_negotiable = true;
        job.salary = get_str(data, &["salaryTextJsonLd"]);
        if job.salary.is_empty() {
            job.salary = "Thỏa thuận".to_string();
        }
    } else if job.salary_min > 0 && job.salary_max > 0 {
        job.salary = format!(
            "{} - {} triệu",
            job.salary_min / 1_000_000,
            job.salary_max / 1_000_000
        );
    } else if job.salary_min > 0 {
        job.salary = format!("Trên {} triệu", job.salary_min / 1_000_000);
    } else {
        let text = get_str(data, &["salaryText"]);
        if !text.is_empty() {
            job.is_negotiable = salary::is_negotiable(&text);
            job.salary = text;
        } else {
            job.salary = "Thỏa thuận".to_string();
            job.is_negotiable = true;
        }
    }

    if job.salary_min > 1000 {
        job.salary_min /= 1_000_000;
    }
    if job.salary_max > 1000 {
        job.salary_max /= 1_000_000;
    }

    // The scraped detail page beats the API's numeric experience code.
    job.experience = get_str(data, &["experienceText"]);
    job.experience_tags = experience::tags_for_text(&job.experience);

    job.total_views = get_i64(data, &["totalViews"]);
    job.total_resume_applied = get_i64(data, &["totalResumeApplied"]);
    job.rate_response = get_f64(data, &["rateResponse"]);

    job.skills = parse_skills(data.get("skills"));
    job.qualifications = get_str(data, &["qualifications"]);
    if job.qualifications.is_empty() {
        job.qualifications = "Không yêu cầu".to_string();
    }
    job.company_website = get_str(data, &["companyWebsite"]);
    job.occupational_category = get_str(data, &["occupationalCategory"]);
    job.employment_type = get_str(data, &["employmentType"]);
    job.benefits = get_str(data, &["jobBenefits"]);
    job.industry = get_str_array(data, "industry");

    if let Some(value) = data.get("expiredAt") {
        job.expired_at = parse_epoch(value);
    }
    if let Some(value) = data.get("createdAt") {
        job.created_at = parse_epoch(value);
    }
    if let Some(value) = data.get("updatedAt") {
        job.updated_at = parse_epoch(value);
    }
}

/// Skills arrive as an array or a single delimited string (" - ", ",", ";").
fn parse_skills(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.to_string())
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => {
            let parts: Vec<&str> = if s.contains(" - ") {
                s.split(" - ").collect()
            } else if s.contains(',') {
                s.split(',').collect()
            } else if s.contains(';') {
                s.split(';').collect()
            } else {
                return vec![s.clone()];
            };

            parts
                .into_iter()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| p.to_string())
                .collect()
        }
        _ => Vec::new(),
    }
}
