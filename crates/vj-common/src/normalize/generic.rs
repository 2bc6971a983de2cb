//! Fallback mapping for sources whose payloads already use human-readable
//! keys, either English or Vietnamese (topcv, careerviet, scraped pages).

use serde_json::{Map, Value};

use crate::domain::Job;
use crate::normalize::{get_str, salary};

pub fn apply(job: &mut Job, data: &Map<String, Value>) {
    job.title = get_str(data, &["title", "Tiêu đề tin"]);
    job.company = get_str(data, &["company", "company_name", "Công ty"]);
    job.location = get_str(data, &["location", "Địa điểm tuyển dụng", "address"]);

    let city = get_str(data, &["province", "Tỉnh thành tuyển dụng", "city"]);
    if !city.is_empty() {
        job.location_city = vec![city];
    }

    job.position = get_str(data, &["position", "Chức vụ", "job_level"]);
    job.salary = get_str(data, &["salary", "Mức lương"]);
    job.work_type = get_str(data, &["work_type", "Hình thức làm việc", "job_type"]);

    let industry = get_str(data, &["industry", "Ngành nghề"]);
    if !industry.is_empty() {
        job.industry = vec![industry];
    }

    job.field = get_str(data, &["field", "Lĩnh vực"]);
    job.experience = get_str(data, &["experience", "Kinh nghiệm"]);
    job.description = get_str(data, &["description", "job_description"]);
    job.requirements = get_str(data, &["requirements", "job_requirements"]);
    job.benefits = get_str(data, &["benefits", "job_benefits"]);

    let (min, max) = salary::parse_display(&job.salary);
    job.salary_min = min;
    job.salary_max = max;
    job.is_negotiable = salary::is_negotiable(&job.salary);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_vietnamese_keys() {
        let Value::Object(data) = json!({
            "Tiêu đề tin": "Kế toán trưởng",
            "Công ty": "Công ty CP XYZ",
            "Địa điểm tuyển dụng": "Hà Nội",
            "Tỉnh thành tuyển dụng": "Hà Nội",
            "Mức lương": "15 - 20 triệu",
            "Ngành nghề": "Kế toán",
            "Kinh nghiệm": "5 năm",
        }) else {
            unreachable!()
        };

        let mut job = Job::default();
        apply(&mut job, &data);
        assert_eq!(job.title, "Kế toán trưởng");
        assert_eq!(job.location_city, vec!["Hà Nội"]);
        assert_eq!((job.salary_min, job.salary_max), (15, 20));
        assert_eq!(job.industry, vec!["Kế toán"]);
        assert!(!job.is_negotiable);
    }

    #[test]
    fn reads_english_keys_and_detects_negotiable() {
        let Value::Object(data) = json!({
            "title": "Sales Executive",
            "company": "ABC Ltd",
            "salary": "Thỏa thuận",
            "description": "Bán hàng khu vực phía Nam",
        }) else {
            unreachable!()
        };

        let mut job = Job::default();
        apply(&mut job, &data);
        assert_eq!(job.title, "Sales Executive");
        assert!(job.is_negotiable);
        assert_eq!((job.salary_min, job.salary_max), (0, 0));
    }

    #[test]
    fn open_ended_salary_parses_lower_bound() {
        let Value::Object(data) = json!({ "title": "x", "salary": "Trên 30 triệu" }) else {
            unreachable!()
        };

        let mut job = Job::default();
        apply(&mut job, &data);
        assert_eq!((job.salary_min, job.salary_max), (30, 0));
    }
}
