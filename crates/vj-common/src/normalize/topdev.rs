//! Mapping for the TopDev API payload (flat JSON with plain arrays).

use serde_json::{Map, Value};

use crate::domain::Job;
use crate::normalize::{experience, get_i64, get_str, get_str_array, salary};

pub fn apply(job: &mut Job, data: &Map<String, Value>) {
    job.title = get_str(data, &["title"]);
    job.company = get_str(data, &["company"]);
    job.description = get_str(data, &["description"]);
    job.requirements = get_str(data, &["requirement"]);

    job.benefits = get_str_array(data, "benefits").join("; ");

    let locations = get_str_array(data, "locations");
    if !locations.is_empty() {
        job.location = locations.join("; ");
        // The city is the last comma segment of each address.
        job.location_city = locations
            .iter()
            .filter_map(|loc| loc.rsplit(',').next())
            .map(|city| city.trim().to_string())
            .filter(|city| !city.is_empty())
            .collect();
    }

    job.salary_min = get_i64(data, &["salary_min"]);
    job.salary_max = get_i64(data, &["salary_max"]);
    if job.salary_min > 1000 {
        job.salary_min /= 1_000_000;
    }
    if job.salary_max > 1000 {
        job.salary_max /= 1_000_000;
    }

    let text = get_str(data, &["salary_text"]);
    if !text.is_empty() {
        job.is_negotiable = salary::is_negotiable(&text);
        job.salary = text;
    } else if job.salary_min > 0 && job.salary_max > 0 {
        job.salary = format!("{} - {} triệu", job.salary_min, job.salary_max);
    } else {
        job.salary = "Thỏa thuận".to_string();
        job.is_negotiable = true;
    }

    let skills = get_str_array(data, "skills");
    if !skills.is_empty() {
        job.field = skills.join(", ");
        job.skills = skills;
    }

    job.experience = parse_experience(data.get("experience"));
    job.experience_tags = experience::tags_for_text(&job.experience);

    job.position = parse_level(data.get("level"));
}

/// Experience may be display text or a bare year count.
fn parse_experience(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(|y| format!("{y} năm"))
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Level is either a plain string or `{ "name": … }`.
fn parse_level(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> Map<String, Value> {
        let Value::Object(map) = json!({
            "title": "Rust Developer",
            "company": "Startup X",
            "description": "Own the ingestion pipeline",
            "requirement": "2 năm kinh nghiệm",
            "benefits": ["Macbook", "Bảo hiểm"],
            "locations": ["12 Tôn Đản, Quận 4, Hồ Chí Minh", "Cầu Giấy, Hà Nội"],
            "salary_min": 25_000_000,
            "salary_max": 40_000_000,
            "skills": ["Rust", "Redis"],
            "experience": 3,
            "level": { "name": "Senior" },
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn city_is_last_segment_of_each_location() {
        let mut job = Job::default();
        apply(&mut job, &fixture());
        assert_eq!(job.location_city, vec!["Hồ Chí Minh", "Hà Nội"]);
        assert_eq!(
            job.location,
            "12 Tôn Đản, Quận 4, Hồ Chí Minh; Cầu Giấy, Hà Nội"
        );
    }

    #[test]
    fn salary_integers_scale_to_millions() {
        let mut job = Job::default();
        apply(&mut job, &fixture());
        assert_eq!((job.salary_min, job.salary_max), (25, 40));
        assert_eq!(job.salary, "25 - 40 triệu");
    }

    #[test]
    fn numeric_experience_renders_as_years() {
        let mut job = Job::default();
        apply(&mut job, &fixture());
        assert_eq!(job.experience, "3 năm");
        assert_eq!(job.experience_tags, vec!["E", "F"]);
    }

    #[test]
    fn skills_fill_both_field_and_skills() {
        let mut job = Job::default();
        apply(&mut job, &fixture());
        assert_eq!(job.field, "Rust, Redis");
        assert_eq!(job.skills, vec!["Rust", "Redis"]);
        assert_eq!(job.position, "Senior");
    }
}
