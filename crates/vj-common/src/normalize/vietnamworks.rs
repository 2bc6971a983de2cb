//! Mapping for the VietnamWorks search API payload (camelCase JSON with
//! nested benefits, locations, skills and industry arrays).

use serde_json::{Map, Value};

use crate::domain::Job;
use crate::normalize::{experience, get_i64, get_str, salary};

pub fn apply(job: &mut Job, data: &Map<String, Value>) {
    job.title = get_str(data, &["jobTitle", "title"]);
    job.company = get_str(data, &["companyName", "company"]);
    job.description = get_str(data, &["jobDescription", "description"]);
    job.requirements = get_str(data, &["jobRequirement", "requirement"]);

    job.benefits = parse_benefits(data.get("benefits"));

    job.location = get_str(data, &["address"]);
    if job.location.is_empty() {
        job.location = parse_location_addresses(data.get("workingLocations"));
    }
    job.location_city = parse_location_cities(data.get("workingLocations"));

    // Salary arrives in absolute đồng; anything above a thousand is scaled
    // down to millions.
    job.salary_min = get_i64(data, &["salaryMin", "salary_min"]);
    job.salary_max = get_i64(data, &["salaryMax", "salary_max"]);
    if job.salary_min > 1000 {
        job.salary_min /= 1_000_000;
    }
    if job.salary_max > 1000 {
        job.salary_max /= 1_000_000;
    }

    let pretty = get_str(data, &["prettySalary"]);
    if !pretty.is_empty() {
        job.is_negotiable = salary::is_negotiable(&pretty);
        job.salary = pretty;
    } else if job.salary_min > 0 && job.salary_max > 0 && job.salary_max < 999 {
        job.salary = format!("{} - {} triệu", job.salary_min, job.salary_max);
    } else if job.salary_min > 0 {
        job.salary = format!("Trên {} triệu", job.salary_min);
    } else {
        job.salary = "Thỏa thuận".to_string();
        job.is_negotiable = true;
        job.salary_min = 0;
        job.salary_max = 0;
    }

    job.field = parse_skill_names(data.get("skills"));

    let years = get_i64(data, &["yearsOfExperience"]);
    if years > 0 {
        job.experience = format!("{years} năm");
        job.experience_tags = experience::tags_for_years(years);
    }

    job.position = get_str(data, &["jobLevelVI", "jobLevel"]);

    job.industry = parse_industries(data.get("industriesV3"));
    if job.industry.is_empty() {
        if let Some(parent) = parse_job_function(data.get("jobFunction")) {
            job.industry = vec![parent];
        }
    }
}

/// `benefits[].benefitValue`, joined for display.
fn parse_benefits(value: Option<&Value>) -> String {
    let Some(Value::Array(items)) = value else {
        return String::new();
    };

    items
        .iter()
        .filter_map(|b| b.get("benefitValue").and_then(Value::as_str))
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

fn parse_location_addresses(value: Option<&Value>) -> String {
    let Some(Value::Array(items)) = value else {
        return String::new();
    };

    items
        .iter()
        .filter_map(|loc| loc.get("address").and_then(Value::as_str))
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

fn parse_location_cities(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|loc| loc.get("cityNameVi").and_then(Value::as_str))
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect()
}

fn parse_skill_names(value: Option<&Value>) -> String {
    let Some(Value::Array(items)) = value else {
        return String::new();
    };

    items
        .iter()
        .filter_map(|s| s.get("skillName").and_then(Value::as_str))
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_industries(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|ind| {
            ind.get("industryNameVi")
                .or_else(|| ind.get("name"))
                .and_then(Value::as_str)
        })
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect()
}

fn parse_job_function(value: Option<&Value>) -> Option<String> {
    let obj = value?.as_object()?;
    obj.get("parentNameVI")
        .or_else(|| obj.get("parentName"))
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> Map<String, Value> {
        let Value::Object(map) = json!({
            "jobTitle": "Senior Backend Engineer",
            "companyName": "Tech Corp",
            "jobDescription": "Build services",
            "jobRequirement": "Rust, SQL",
            "benefits": [
                { "benefitValue": "Lương tháng 13" },
                { "benefitValue": "Bảo hiểm sức khỏe" },
            ],
            "workingLocations": [
                { "address": "123 Lê Lợi, Quận 1", "cityNameVi": "Hồ Chí Minh" },
                { "address": "45 Tràng Tiền", "cityNameVi": "Hà Nội" },
            ],
            "salaryMin": 10_000_000,
            "salaryMax": 15_000_000,
            "prettySalary": "10 - 15 triệu",
            "skills": [ { "skillName": "Rust" }, { "skillName": "PostgreSQL" } ],
            "yearsOfExperience": 2,
            "jobLevelVI": "Trưởng nhóm",
            "industriesV3": [ { "industryNameVi": "Công nghệ thông tin" } ],
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn converts_absolute_salary_to_millions() {
        let mut job = Job::default();
        apply(&mut job, &fixture());
        assert_eq!(job.salary_min, 10);
        assert_eq!(job.salary_max, 15);
        assert_eq!(job.salary, "10 - 15 triệu");
        assert!(!job.is_negotiable);
    }

    #[test]
    fn collects_cities_and_industries_as_arrays() {
        let mut job = Job::default();
        apply(&mut job, &fixture());
        assert_eq!(job.location_city, vec!["Hồ Chí Minh", "Hà Nội"]);
        assert_eq!(job.industry, vec!["Công nghệ thông tin"]);
        assert_eq!(job.location, "123 Lê Lợi, Quận 1");
    }

    #[test]
    fn numeric_experience_uses_year_buckets() {
        let mut job = Job::default();
        apply(&mut job, &fixture());
        assert_eq!(job.experience, "2 năm");
        assert_eq!(job.experience_tags, vec!["C"]);
    }

    #[test]
    fn job_function_parent_backfills_industry() {
        let mut data = fixture();
        data.remove("industriesV3");
        data.insert(
            "jobFunction".into(),
            json!({ "parentNameVI": "Kế toán" }),
        );

        let mut job = Job::default();
        apply(&mut job, &data);
        assert_eq!(job.industry, vec!["Kế toán"]);
    }

    #[test]
    fn missing_salary_falls_back_to_negotiable() {
        let mut data = fixture();
        data.remove("prettySalary");
        data.insert("salaryMin".into(), json!(0));
        data.insert("salaryMax".into(), json!(0));

        let mut job = Job::default();
        apply(&mut job, &data);
        assert_eq!(job.salary, "Thỏa thuận");
        assert!(job.is_negotiable);
        assert_eq!((job.salary_min, job.salary_max), (0, 0));
    }

    #[test]
    fn negotiable_pretty_salary_is_flagged() {
        let mut data = fixture();
        data.insert("prettySalary".into(), json!("Thương lượng"));

        let mut job = Job::default();
        apply(&mut job, &data);
        assert!(job.is_negotiable);
    }
}
