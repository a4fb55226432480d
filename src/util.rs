use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::param::{HttpStatus, HTTP_DATETIME_FORMAT};

/// 当前时间的来源。响应构建通过它获取 `Date` 头的时间。
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// 直接读取系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// 错误页生成器。页面内容只由状态码决定，不会包含任何请求中的内容。
pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status(status: HttpStatus) -> Self {
        let title = status.to_string();
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            status.code(),
            status.reason()
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
<html>
    <head>
        <meta charset="utf-8">
        <title>{}</title>
        <style>{}</style>
    </head>
    <body>
    {}
    </body>
</html>
"##,
            self.title, self.css, self.body
        )
    }
}

/// 把 `SystemTime` 转换为 UTC 时间，超出 chrono 可表示范围时返回 `None`
pub fn to_utc(time: SystemTime) -> Option<DateTime<Utc>> {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => DateTime::from_timestamp(i64::try_from(d.as_secs()).ok()?, d.subsec_nanos()),
        Err(e) => {
            // 1970 年之前的时间，向下取整到整秒
            let d = e.duration();
            let mut secs = i64::try_from(d.as_secs()).ok()?;
            if d.subsec_nanos() > 0 {
                secs = secs.checked_add(1)?;
            }
            DateTime::from_timestamp(-secs, 0)
        }
    }
}

/// 按 RFC 1123 格式化，例如 `Wed, 10 Oct 2018 18:39:41 GMT`
pub fn http_date(time: SystemTime) -> Option<String> {
    to_utc(time).map(|t| t.format(HTTP_DATETIME_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_http_date_format() {
        let time = UNIX_EPOCH + Duration::from_secs(1_539_196_781);
        assert_eq!(http_date(time).unwrap(), "Wed, 10 Oct 2018 18:39:41 GMT");
    }

    #[test]
    fn test_http_date_epoch_and_before() {
        assert_eq!(http_date(UNIX_EPOCH).unwrap(), "Thu, 01 Jan 1970 00:00:00 GMT");
        let before = UNIX_EPOCH - Duration::from_millis(1500);
        assert_eq!(http_date(before).unwrap(), "Wed, 31 Dec 1969 23:59:58 GMT");
    }

    #[test]
    fn test_http_date_out_of_range() {
        let far = UNIX_EPOCH + Duration::from_secs(1 << 60);
        assert!(http_date(far).is_none());
    }

    #[test]
    fn test_system_clock_is_formattable() {
        let date = http_date(SystemClock.now()).unwrap();
        assert!(date.ends_with(" GMT"));
    }

    #[test]
    fn test_html_builder_from_status() {
        let html = HtmlBuilder::from_status(HttpStatus::NotFound).build();
        assert!(html.contains("<title>404 Not Found</title>"));
        assert!(html.contains("<h1>404</h1>"));
        assert!(html.contains("<p>Not Found</p>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("charset=\"utf-8\""));
    }

    #[test]
    fn test_html_builder_all_statuses() {
        for status in [
            HttpStatus::BadRequest,
            HttpStatus::Forbidden,
            HttpStatus::NotFound,
            HttpStatus::InternalServerError,
            HttpStatus::NotImplemented,
        ] {
            let html = HtmlBuilder::from_status(status).build();
            assert!(html.contains(&status.code().to_string()));
            assert!(html.contains(status.reason()));
            assert!(html.contains("</html>"));
        }
    }
}
